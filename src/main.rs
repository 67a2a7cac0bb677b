#![cfg_attr(target_arch = "avr", no_std)]
#![cfg_attr(target_arch = "avr", no_main)]
#![cfg_attr(target_arch = "avr", feature(abi_avr_interrupt))]

#[cfg(target_arch = "avr")]
mod firmware {
    use panic_halt as _;

    use traffic_light_firmware::application::TrafficLight;
    use traffic_light_firmware::config::{BUTTON_PIN, LED_PINS, UART_BAUD};
    use traffic_light_firmware::drivers::{
        Button, ButtonLatch, ButtonState, LedBank, Polarity, SerialConsole,
    };
    use traffic_light_firmware::hal::{
        ExtLine, ExternalInterrupts, InterruptTable, Mmio, Pin, Sense, Timer8, Vector,
    };
    use traffic_light_firmware::hal::timer::Tc0;
    use traffic_light_firmware::logger::{Logger, DEFAULT_LEVEL};
    use traffic_light_firmware::{error, info, warn};

    static VECTORS: InterruptTable = InterruptTable::new();
    static BUTTON: ButtonLatch = ButtonLatch::new();

    fn on_button() {
        BUTTON.notify();
    }

    #[avr_device::entry]
    fn main() -> ! {
        let mut log = Logger::new(SerialConsole::new(Mmio, UART_BAUD), DEFAULT_LEVEL);
        info!(log, "traffic light v{}", env!("CARGO_PKG_VERSION"));

        let leds = LED_PINS.map(|(port, n)| Pin::new(Mmio, port, n).into_output());
        let lights = LedBank::new(leds);

        let (port, n) = BUTTON_PIN;
        let button = Button::new(Pin::new(Mmio, port, n).into_pull_up_input(), Polarity::ActiveLow);
        if let Ok(ButtonState::Pressed) = button.read() {
            warn!(log, "button held at boot");
        }

        let mut lines = ExternalInterrupts::new(Mmio, &VECTORS);
        match lines.init(ExtLine::Int0, Sense::FallingEdge, Some(on_button)) {
            Ok(()) => lines.enable(ExtLine::Int0),
            Err(e) => error!(log, "button interrupt: {}", e),
        }

        // SAFETY: every callback the ISRs can reach is registered.
        unsafe { avr_device::interrupt::enable() };

        let delay = Timer8::<_, Tc0>::new(Mmio, &VECTORS);
        TrafficLight::new(delay, lights, &BUTTON, log).run()
    }

    #[avr_device::interrupt(atmega32a)]
    fn TIMER0_OVF() {
        VECTORS.dispatch(&Mmio, Vector::Timer0Overflow);
    }

    #[avr_device::interrupt(atmega32a)]
    fn TIMER0_COMP() {
        VECTORS.dispatch(&Mmio, Vector::Timer0Compare);
    }

    #[avr_device::interrupt(atmega32a)]
    fn TIMER1_OVF() {
        VECTORS.dispatch(&Mmio, Vector::Timer1Overflow);
    }

    #[avr_device::interrupt(atmega32a)]
    fn TIMER1_COMPA() {
        VECTORS.dispatch(&Mmio, Vector::Timer1CompareA);
    }

    #[avr_device::interrupt(atmega32a)]
    fn TIMER1_COMPB() {
        VECTORS.dispatch(&Mmio, Vector::Timer1CompareB);
    }

    #[avr_device::interrupt(atmega32a)]
    fn TIMER1_CAPT() {
        VECTORS.dispatch(&Mmio, Vector::Timer1Capture);
    }

    #[avr_device::interrupt(atmega32a)]
    fn TIMER2_OVF() {
        VECTORS.dispatch(&Mmio, Vector::Timer2Overflow);
    }

    #[avr_device::interrupt(atmega32a)]
    fn TIMER2_COMP() {
        VECTORS.dispatch(&Mmio, Vector::Timer2Compare);
    }

    #[avr_device::interrupt(atmega32a)]
    fn INT0() {
        VECTORS.dispatch(&Mmio, Vector::Int0);
    }

    #[avr_device::interrupt(atmega32a)]
    fn INT1() {
        VECTORS.dispatch(&Mmio, Vector::Int1);
    }

    #[avr_device::interrupt(atmega32a)]
    fn INT2() {
        VECTORS.dispatch(&Mmio, Vector::Int2);
    }
}

#[cfg(not(target_arch = "avr"))]
fn main() {
    eprintln!("traffic_light_firmware only runs on the ATmega32; build with --target avr-atmega32");
}
