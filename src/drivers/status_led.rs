//! On-board status LED driver.
//!
//! The ESP32-C3 Super Mini routes its blue LED between GPIO 8 and 3V3,
//! making the logic inverted: driving the pin LOW lights the LED.  This
//! driver hides the inversion so callers think in "lit"/"dark".
//!
//! Generic over an `embedded-hal` [`OutputPin`] for host testing.

use core::time::Duration;

use embedded_hal::digital::OutputPin;
use log::error;

pub struct StatusLed<P: OutputPin> {
    pin: P,
    lit: bool,
}

impl<P: OutputPin> StatusLed<P> {
    /// Takes the pin and turns the LED off.
    pub fn new(pin: P) -> Self {
        let mut led = Self { pin, lit: false };
        led.set_lit(false);
        led
    }

    pub fn set_lit(&mut self, lit: bool) {
        // Inverted: LOW = lit.
        let result = if lit {
            self.pin.set_low()
        } else {
            self.pin.set_high()
        };
        if let Err(e) = result {
            error!("status LED GPIO write failed: {e:?}");
            return;
        }
        self.lit = lit;
    }

    pub fn is_lit(&self) -> bool {
        self.lit
    }

    /// Blocking blink, used as a boot/activity indicator.
    pub fn blink(&mut self, times: u8, interval: Duration) {
        for _ in 0..times {
            self.set_lit(true);
            std::thread::sleep(interval);
            self.set_lit(false);
            std::thread::sleep(interval);
        }
    }
}
