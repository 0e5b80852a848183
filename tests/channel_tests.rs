//! Integration tests for PWM/digital channels and the channel registry

mod common;
use common::*;

use pico_sequencer::registry::PwmOutput;
use pico_sequencer::{
    ChannelConfig, ChannelRegistry, DeviceError, DigitalChannel, OutputDevice, PwmChannel,
    PwmRgb, Srgb, SubChannel, colors,
};

const ROUND_TRIP_VALUES: [f32; 5] = [0.0, 0.25, 0.5, 0.75, 1.0];

#[test]
fn value_round_trips_active_high() {
    let registry = ChannelRegistry::new();
    let mut channel =
        PwmChannel::new(MockPwm::new(), 2, &registry, ChannelConfig::new()).unwrap();

    let tolerance = 1.0 / f32::from(channel.duty_factor());
    for value in ROUND_TRIP_VALUES {
        channel.write(value).unwrap();
        let read = channel.read().unwrap();
        assert!((read - value).abs() <= tolerance, "wrote {value}, read {read}");
    }
}

#[test]
fn value_round_trips_active_low_with_coarse_duty() {
    let registry = ChannelRegistry::new();
    let config = ChannelConfig::new().active_low().duty_factor(255);
    let mut channel = PwmChannel::new(MockPwm::new(), 3, &registry, config).unwrap();

    let tolerance = 1.0 / 255.0;
    for value in ROUND_TRIP_VALUES {
        channel.write(value).unwrap();
        let read = channel.read().unwrap();
        assert!((read - value).abs() <= tolerance, "wrote {value}, read {read}");
    }
}

#[test]
fn active_low_inverts_raw_duty() {
    let registry = ChannelRegistry::new();
    let config = ChannelConfig::new().active_low().duty_factor(1000);
    let mut channel = PwmChannel::new(MockPwm::new(), 4, &registry, config).unwrap();

    // Initial value 0.0 drives the pin fully high on an active-low output
    assert_eq!(channel.raw_duty(), 1000);

    channel.write(1.0).unwrap();
    assert_eq!(channel.raw_duty(), 0);

    channel.write(0.25).unwrap();
    assert_eq!(channel.raw_duty(), 750);
}

#[test]
fn initial_value_is_written_on_construction() {
    let registry = ChannelRegistry::new();
    let config = ChannelConfig::new().duty_factor(100).initial_value(0.5);
    let channel = PwmChannel::new(MockPwm::new(), 6, &registry, config).unwrap();

    assert_eq!(channel.raw_duty(), 50);
    assert!(approx_eq(channel.read().unwrap(), 0.5));
}

#[test]
fn out_of_range_write_is_rejected() {
    let registry = ChannelRegistry::new();
    let mut channel =
        PwmChannel::new(MockPwm::new(), 2, &registry, ChannelConfig::new()).unwrap();
    channel.write(0.5).unwrap();
    let before = channel.raw_duty();

    assert_eq!(channel.write(1.5), Err(DeviceError::InvalidValue));
    assert_eq!(channel.write(-0.1), Err(DeviceError::InvalidValue));
    assert_eq!(channel.write(f32::NAN), Err(DeviceError::InvalidValue));
    assert_eq!(channel.raw_duty(), before);
}

#[test]
fn invalid_construction_parameters_are_rejected() {
    let registry = ChannelRegistry::new();

    let result = PwmChannel::new(
        MockPwm::new(),
        2,
        &registry,
        ChannelConfig::new().initial_value(2.0),
    );
    assert!(matches!(result, Err(DeviceError::InvalidValue)));

    let result = PwmChannel::new(
        MockPwm::with_max_duty(1000),
        2,
        &registry,
        ChannelConfig::new().duty_factor(2000),
    );
    assert!(matches!(result, Err(DeviceError::InvalidValue)));

    let result = PwmChannel::new(MockPwm::new(), 2, &registry, ChannelConfig::new().duty_factor(0));
    assert!(matches!(result, Err(DeviceError::InvalidValue)));

    // Nothing was claimed by the failed attempts
    assert!(registry.is_free(2));
}

#[test]
fn second_pin_on_same_output_is_refused() {
    let registry = ChannelRegistry::new();
    let _first = PwmChannel::new(MockPwm::new(), 0, &registry, ChannelConfig::new()).unwrap();

    let second = PwmChannel::new(MockPwm::new(), 16, &registry, ChannelConfig::new());
    match second {
        Err(DeviceError::ChannelInUse { output, owner }) => {
            assert_eq!(
                output,
                PwmOutput {
                    slice: 0,
                    channel: SubChannel::A
                }
            );
            assert_eq!(owner, 0);
        }
        _ => panic!("expected ChannelInUse"),
    }
}

#[test]
fn same_pin_twice_is_refused() {
    let registry = ChannelRegistry::new();
    let _first = PwmChannel::new(MockPwm::new(), 5, &registry, ChannelConfig::new()).unwrap();

    let second = PwmChannel::new(MockPwm::new(), 5, &registry, ChannelConfig::new());
    assert!(matches!(second, Err(DeviceError::ChannelInUse { owner: 5, .. })));
}

#[test]
fn pin_without_pwm_is_refused() {
    let registry = ChannelRegistry::new();
    let result = PwmChannel::new(MockPwm::new(), 30, &registry, ChannelConfig::new());
    assert!(matches!(result, Err(DeviceError::InvalidPin(30))));
}

#[test]
fn close_releases_output_and_blocks_use() {
    let registry = ChannelRegistry::new();
    let mut channel =
        PwmChannel::new(MockPwm::new(), 0, &registry, ChannelConfig::new()).unwrap();

    channel.close();
    assert!(channel.is_closed());
    assert!(registry.is_free(16));
    assert_eq!(channel.read(), Err(DeviceError::Closed));
    assert_eq!(channel.write(0.5), Err(DeviceError::Closed));

    // Closing twice is harmless
    channel.close();

    let reuse = PwmChannel::new(MockPwm::new(), 16, &registry, ChannelConfig::new());
    assert!(reuse.is_ok());
}

#[test]
fn drop_releases_output() {
    let registry = ChannelRegistry::new();
    {
        let _channel =
            PwmChannel::new(MockPwm::new(), 7, &registry, ChannelConfig::new()).unwrap();
        assert!(!registry.is_free(7));
    }
    assert!(registry.is_free(7));
}

#[test]
fn frequency_is_forwarded_to_driver() {
    let registry = ChannelRegistry::new();
    let mut channel =
        PwmChannel::new(MockPwm::new(), 8, &registry, ChannelConfig::new()).unwrap();

    assert_eq!(channel.frequency(), Ok(1000));
    channel.set_frequency(440).unwrap();
    assert_eq!(channel.frequency(), Ok(440));
    assert_eq!(channel.set_frequency(0), Err(DeviceError::InvalidValue));
}

#[test]
fn digital_channel_drives_active_level() {
    let mut led = DigitalChannel::new(MockOutputPin::new(), ChannelConfig::new()).unwrap();
    assert!(!led.is_active().unwrap());

    led.write(0.3).unwrap();
    assert_eq!(led.read(), Ok(1.0));

    led.write(0.0).unwrap();
    assert_eq!(led.read(), Ok(0.0));

    led.close();
    assert_eq!(led.write(1.0), Err(DeviceError::Closed));
}

#[test]
fn digital_channel_active_low_drives_pin_low_when_on() {
    let config = ChannelConfig::new().active_low().initial_value(1.0);
    let channel = DigitalChannel::new(MockOutputPin::new(), config).unwrap();
    assert_eq!(channel.read(), Ok(1.0));
    assert!(!channel.active_high());
}

#[test]
fn rgb_writes_each_component() {
    let registry = ChannelRegistry::new();
    let config = ChannelConfig::new().duty_factor(255);
    let red = PwmChannel::new(MockPwm::new(), 1, &registry, config).unwrap();
    let green = PwmChannel::new(MockPwm::new(), 2, &registry, config).unwrap();
    let blue = PwmChannel::new(MockPwm::new(), 3, &registry, config).unwrap();
    let mut rgb = PwmRgb::new(red, green, blue);

    rgb.set_color([255, 128, 0]).unwrap();
    assert_eq!(rgb.color(), Ok([255, 128, 0]));

    rgb.invert().unwrap();
    assert_eq!(rgb.color(), Ok([0, 127, 255]));

    assert_eq!(
        rgb.write(Srgb::new(0.0, 1.1, 0.0)),
        Err(DeviceError::InvalidValue)
    );

    rgb.write(colors::BLUE).unwrap();
    assert!(rgb.is_active().unwrap());

    OutputDevice::close(&mut rgb);
    assert!(registry.is_free(1));
    assert!(registry.is_free(2));
    assert!(registry.is_free(3));
}

#[test]
fn rgb_write_failure_restores_previous_colour() {
    let registry = ChannelRegistry::new();
    let config = ChannelConfig::new().duty_factor(255);
    let red = PwmChannel::new(MockPwm::new(), 1, &registry, config).unwrap();
    // Accepts the initial off write, rejects everything after
    let green = PwmChannel::new(MockPwm::failing_after(1), 2, &registry, config).unwrap();
    let blue = PwmChannel::new(MockPwm::new(), 3, &registry, config).unwrap();
    let mut rgb = PwmRgb::new(red, green, blue);

    assert_eq!(rgb.write(colors::WHITE), Err(DeviceError::Hardware));
    assert_eq!(rgb.read(), Ok(colors::BLACK));
}
