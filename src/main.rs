#![cfg_attr(target_arch = "avr", no_std)]
#![cfg_attr(target_arch = "avr", no_main)]
#![cfg_attr(target_arch = "avr", feature(abi_avr_interrupt))]

#[cfg(target_arch = "avr")]
mod firmware {
    use core::cell::{Cell, RefCell};

    use avr_device::atmega328p::Peripherals;
    use critical_section::Mutex;
    use embedded_hal::digital::v2::ToggleableOutputPin;
    use panic_halt as _;

    use gb7_firmware::config::{
        BUTTON_POLL_MS, HEARTBEAT_MS, LOG_LEVEL, MAX_TIMERS, TIME_BASE,
    };
    use gb7_firmware::drivers::{ButtonEvent, ButtonHandler, SoundEffect, Speaker};
    use gb7_firmware::hal::board::{self, AnyButton};
    use gb7_firmware::hal::{Power, TickTimer, Uart};
    use gb7_firmware::logger::Logger;
    use gb7_firmware::rtos::{Scheduler, SharedScheduler};
    use gb7_firmware::testing::{
        DispatchTest, HeapOrderTest, PeriodicCancelTest, TestRunner, TickAdvanceTest, TimeBaseTest,
    };
    use gb7_firmware::time::ms;
    use gb7_firmware::Error;

    /// What a scheduler item does when it fires
    #[derive(Clone, Copy)]
    enum Job {
        Speaker,
        Buttons,
        Heartbeat,
    }

    type Sched = Scheduler<Job, MAX_TIMERS>;

    static SCHEDULER: SharedScheduler<Job, MAX_TIMERS> = SharedScheduler::new();
    static SPEAKER: Mutex<RefCell<Option<Speaker<board::Speaker>>>> =
        Mutex::new(RefCell::new(None));
    static BUTTONS: Mutex<RefCell<Option<ButtonHandler<AnyButton, 3>>>> =
        Mutex::new(RefCell::new(None));
    static LED: Mutex<RefCell<Option<board::Led>>> = Mutex::new(RefCell::new(None));
    // Errors raised in tick context, reported from the main loop
    static TICK_ERROR: Mutex<Cell<Option<Error>>> = Mutex::new(Cell::new(None));

    fn dispatch(sched: &mut Sched, job: Job) {
        critical_section::with(|cs| {
            let result = match job {
                Job::Speaker => match SPEAKER.borrow_ref_mut(cs).as_mut() {
                    Some(speaker) => speaker.service(sched, dispatch, Job::Speaker),
                    None => Ok(()),
                },
                Job::Buttons => {
                    if let Some(buttons) = BUTTONS.borrow_ref_mut(cs).as_mut() {
                        buttons.poll();
                    }
                    Ok(())
                }
                Job::Heartbeat => {
                    if let Some(led) = LED.borrow_ref_mut(cs).as_mut() {
                        let _ = led.toggle();
                    }
                    Ok(())
                }
            };
            if let Err(err) = result {
                TICK_ERROR.borrow(cs).set(Some(err));
            }
        });
    }

    #[avr_device::interrupt(atmega328p)]
    fn TIMER2_COMPA() {
        if let Err(err) = SCHEDULER.on_tick() {
            critical_section::with(|cs| TICK_ERROR.borrow(cs).set(Some(err)));
        }
    }

    fn schedule_jobs() -> Result<(), Error> {
        SCHEDULER.invoke_every(ms(BUTTON_POLL_MS as u64), 0, dispatch, Job::Buttons)?;
        SCHEDULER.invoke_every(ms(HEARTBEAT_MS as u64), 0, dispatch, Job::Heartbeat)?;
        SCHEDULER.with(|sched| {
            critical_section::with(|cs| match SPEAKER.borrow_ref_mut(cs).as_mut() {
                Some(speaker) => speaker.start(sched, dispatch, Job::Speaker),
                None => Ok(()),
            })
        })?
    }

    fn with_speaker(f: impl FnOnce(&mut Speaker<board::Speaker>) -> Result<(), Error>) -> Result<(), Error> {
        critical_section::with(|cs| match SPEAKER.borrow_ref_mut(cs).as_mut() {
            Some(speaker) => f(speaker),
            None => Ok(()),
        })
    }

    #[avr_device::entry]
    fn main() -> ! {
        let dp = Peripherals::take().unwrap();

        let pins = board::Pins::new(dp.PORTB, dp.PORTD);
        let mut log = Logger::new(Uart::new(dp.USART0), LOG_LEVEL);
        let mut power = Power::new(dp.CPU);
        let mut timer = TickTimer::new(dp.TC2, TIME_BASE);

        log.info("gb7 firmware v0.1.0");
        log.debug("tick hz", &TIME_BASE.tick_hz());

        critical_section::with(|cs| {
            SPEAKER.borrow(cs).replace(Some(Speaker::new(pins.speaker)));
            BUTTONS.borrow(cs).replace(Some(ButtonHandler::new(pins.buttons)));
            LED.borrow(cs).replace(Some(pins.led));
        });

        if let Err(err) = schedule_jobs() {
            log.log_error("schedule", err);
        }
        match SCHEDULER.init(&mut timer) {
            Ok(_) => log.info("scheduler running"),
            Err(err) => log.log_error("init", err),
        }

        // Enable interrupts globally
        unsafe { avr_device::interrupt::enable() };

        if cfg!(debug_assertions) {
            let mut runner = TestRunner::new(log.into_inner());
            runner.run_suite(
                "Self test",
                &[
                    &HeapOrderTest,
                    &DispatchTest,
                    &PeriodicCancelTest,
                    &TimeBaseTest,
                    &TickAdvanceTest::new(&SCHEDULER, 100_000),
                ],
            );
            log = Logger::new(runner.into_inner(), LOG_LEVEL);
        }

        loop {
            let (event, tick_error) = critical_section::with(|cs| {
                let event = BUTTONS
                    .borrow_ref_mut(cs)
                    .as_mut()
                    .and_then(|buttons| buttons.next_event());
                (event, TICK_ERROR.borrow(cs).take())
            });

            if let Some(err) = tick_error {
                log.log_error("tick", err);
            }

            let played = match event {
                Some(ButtonEvent::Pressed(0)) => {
                    log.info("hit");
                    with_speaker(|speaker| SoundEffect::Hit.play(speaker))
                }
                Some(ButtonEvent::Pressed(1)) => {
                    log.info("tulip");
                    with_speaker(|speaker| SoundEffect::Tulip.play(speaker))
                }
                Some(ButtonEvent::Pressed(2)) => {
                    log.info("stop");
                    with_speaker(|speaker| {
                        speaker.stop();
                        Ok(())
                    })
                }
                Some(ButtonEvent::Pressed(_)) | Some(ButtonEvent::Released(_)) => Ok(()),
                None => {
                    // Nothing pending; wake on the next tick
                    power.enter_idle_mode();
                    Ok(())
                }
            };
            if let Err(err) = played {
                log.log_error("play", err);
            }
        }
    }
}

#[cfg(not(target_arch = "avr"))]
fn main() {}
