//! Watering pump driver (relay-switched DC pump).
//!
//! Simple on/off control through a single digital output.  The driver is
//! generic over an `embedded-hal` [`OutputPin`], so host tests run it
//! against a mock pin and the target wires in a real GPIO.
//!
//! ## Timing contract
//!
//! The pump never decides how long to run.  The command worker owns the
//! watering interval; this driver is a dumb actuator.

use embedded_hal::digital::OutputPin;
use log::error;

pub struct PumpDriver<P: OutputPin> {
    pin: P,
    running: bool,
}

impl<P: OutputPin> PumpDriver<P> {
    pub fn new(pin: P) -> Self {
        Self {
            pin,
            running: false,
        }
    }

    pub fn set_running(&mut self, on: bool) {
        let result = if on {
            self.pin.set_high()
        } else {
            self.pin.set_low()
        };
        if let Err(e) = result {
            error!("pump GPIO write failed: {e:?}");
            return;
        }
        self.running = on;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }
}
