//! Watering hardware adapter — [`ActuatorPort`] over the pump and LED drivers.
//!
//! Generic over `embedded-hal` output pins; the target main instantiates it
//! with real `esp-idf-hal` GPIO drivers, tests with mock pins.

use core::time::Duration;

use embedded_hal::digital::OutputPin;

use crate::app::ports::ActuatorPort;
use crate::drivers::pump::PumpDriver;
use crate::drivers::status_led::StatusLed;

pub struct WateringHardware<P: OutputPin, L: OutputPin> {
    pump: PumpDriver<P>,
    led: StatusLed<L>,
}

impl<P: OutputPin, L: OutputPin> WateringHardware<P, L> {
    /// Takes both pins with the pump off and the LED dark.
    pub fn new(pump_pin: P, led_pin: L) -> Self {
        let mut pump = PumpDriver::new(pump_pin);
        pump.set_running(false);
        Self {
            pump,
            led: StatusLed::new(led_pin),
        }
    }

    /// Boot/activity indication.
    pub fn blink_indicator(&mut self, times: u8, interval: Duration) {
        self.led.blink(times, interval);
    }

    pub fn pump_running(&self) -> bool {
        self.pump.is_running()
    }
}

impl<P, L> ActuatorPort for WateringHardware<P, L>
where
    P: OutputPin + Send,
    L: OutputPin + Send,
{
    fn set_pump(&mut self, on: bool) {
        self.pump.set_running(on);
    }

    fn set_indicator(&mut self, on: bool) {
        self.led.set_lit(on);
    }
}
