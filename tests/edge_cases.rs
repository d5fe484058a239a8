//! Edge case and boundary condition tests for the command side, plus runs
//! with the tick side on its own thread.

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use rs_dcc::config::AckConfig;
use rs_dcc::hal::{MockDelay, MockPower, MockSense, MockSignal, StdDelay};
use rs_dcc::{
    AccessoryAddress, Channel, ChannelConfig, DccChannel, DccError, Direction, Packet,
    ProgrammingTrack, Register, SlotIndex, SlotTable, TickHandler, TrackSignal,
};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn test_channel<const N: usize>(
    publisher: rs_dcc::Publisher<'_, N>,
) -> Channel<'_, MockPower, MockSense, MockDelay, N> {
    Channel::new(
        publisher,
        MockPower::new(),
        MockSense::constant(0),
        MockDelay::new(),
        ChannelConfig::main().with_publish_timeout_ms(10),
    )
}

// ============================================================================
// Slot table boundaries
// ============================================================================

#[test]
fn full_table_rejects_new_register_without_waiting() {
    init_logging();
    let mut table: SlotTable<2> = SlotTable::new();
    let (publisher, mut scheduler) = table.split();
    let mut main = test_channel(publisher);

    main.set_throttle(1, 3, 10, Direction::Forward).unwrap();
    scheduler.consume();
    main.set_throttle(2, 4, 10, Direction::Forward).unwrap();
    // Leave this one staged: the full check comes before the mailbox wait
    assert_eq!(
        main.set_throttle(3, 5, 10, Direction::Forward),
        Err(DccError::SlotTableFull)
    );
    assert_eq!(main.delay().total_ms, 0);
    assert_eq!(main.publisher().occupied(), 0b110);
    assert_eq!(main.publisher().len(), 2);

    // A known register still gets through once the mailbox drains
    scheduler.consume();
    assert_eq!(
        main.set_throttle(1, 3, 20, Direction::Forward),
        Ok(SlotIndex::new(1))
    );
}

#[test]
fn stalled_tick_side_times_out_and_keeps_staged_packet() {
    init_logging();
    let mut table: SlotTable<4> = SlotTable::new();
    let (publisher, _scheduler) = table.split();
    let mut main = test_channel(publisher);

    // Idle sits in the mailbox and nothing drains it
    main.begin().unwrap();
    assert_eq!(
        main.set_throttle(1, 3, 10, Direction::Forward),
        Err(DccError::PublishTimeout)
    );
    assert_eq!(main.delay().total_ms, 10);
    assert_eq!(
        main.publisher().pending(),
        Some((SlotIndex::IDLE_HOME, Packet::IDLE))
    );
    // No slot was allocated for the failed publish
    assert_eq!(main.publisher().occupied(), 0);
    assert!(main.publisher().is_empty());
}

#[test]
fn unknown_release_is_noop() {
    let mut table: SlotTable<4> = SlotTable::new();
    let (publisher, _scheduler) = table.split();
    let mut main = test_channel(publisher);

    assert_eq!(main.unload(Register::Id(42)), Ok(None));
    assert_eq!(main.unload(Register::Immediate), Ok(None));
    assert!(main.publisher().pending().is_none());
    assert_eq!(main.delay().calls, 0);
}

#[test]
fn releasing_one_of_two_keeps_cycle_without_idle() {
    let mut table: SlotTable<4> = SlotTable::new();
    let (publisher, mut scheduler) = table.split();
    let mut main = test_channel(publisher);

    main.set_throttle(1, 3, 10, Direction::Forward).unwrap();
    scheduler.consume();
    main.set_throttle(2, 4, 10, Direction::Forward).unwrap();
    scheduler.consume();

    assert_eq!(main.unload(Register::Id(1)), Ok(Some(SlotIndex::new(1))));
    assert!(main.publisher().pending().is_none());
    assert_eq!(main.publisher().occupied(), 0b100);
    assert_eq!(main.publisher().max_occupied(), 2);

    // Only slot 2 is left in the cycle
    assert_eq!(scheduler.consume(), SlotIndex::new(2));
    assert_eq!(scheduler.consume(), SlotIndex::new(2));

    assert_eq!(main.unload(Register::Id(2)), Ok(Some(SlotIndex::new(2))));
    assert_eq!(main.publisher().max_occupied(), 0);
    assert_eq!(scheduler.consume(), SlotIndex::IDLE_HOME);
    assert_eq!(*scheduler.current_packet(), Packet::IDLE);
}

#[test]
fn unload_never_leaves_stale_update_for_a_freed_slot() {
    init_logging();
    let mut table: SlotTable<4> = SlotTable::new();
    let (publisher, mut scheduler) = table.split();
    let mut main = test_channel(publisher);

    main.set_throttle(1, 3, 10, Direction::Forward).unwrap();
    scheduler.consume();
    main.set_throttle(2, 4, 10, Direction::Forward).unwrap();

    // Register 2's first packet has not reached its slot yet
    assert_eq!(main.unload(Register::Id(2)), Err(DccError::PublishTimeout));
    assert_eq!(main.publisher().occupied(), 0b110);

    let current = scheduler.consume();
    assert_eq!(current, SlotIndex::new(2));
    assert_ne!(main.publisher().occupied() & (1 << current.get()), 0);

    assert_eq!(main.unload(Register::Id(2)), Ok(Some(SlotIndex::new(2))));
    assert_eq!(scheduler.consume(), SlotIndex::new(1));
    assert_eq!(
        scheduler.current_packet().data_bytes().as_slice(),
        &[0x03, 0x3F, 0x8B, 0xB7]
    );
}

// ============================================================================
// Invalid input
// ============================================================================

#[test]
fn invalid_addresses_stage_nothing() {
    let mut table: SlotTable<4> = SlotTable::new();
    let (publisher, _scheduler) = table.split();
    let mut main = test_channel(publisher);

    assert_eq!(
        main.set_throttle(1, 0, 10, Direction::Forward),
        Err(DccError::InvalidAddress)
    );
    assert_eq!(
        main.set_throttle(1, 10240, 10, Direction::Forward),
        Err(DccError::InvalidAddress)
    );
    assert_eq!(
        main.set_accessory(AccessoryAddress::Output(0), true),
        Err(DccError::InvalidAddress)
    );
    assert_eq!(
        main.set_accessory(
            AccessoryAddress::Board {
                address: 1,
                channel: 4
            },
            true
        ),
        Err(DccError::InvalidAddress)
    );
    assert!(main.publisher().pending().is_none());
    assert!(main.publisher().is_empty());
}

#[test]
fn raw_payload_length_bounds() {
    let mut table: SlotTable<4> = SlotTable::new();
    let (publisher, _scheduler) = table.split();
    let mut main = test_channel(publisher);

    assert_eq!(
        main.load_packet(Register::Id(1), &[0x03], 0),
        Err(DccError::InvalidPayload { len: 1 })
    );
    assert_eq!(
        main.load_packet(Register::Id(1), &[0; 6], 0),
        Err(DccError::InvalidPayload { len: 6 })
    );
    assert_eq!(main.publisher().occupied(), 0);

    // Five data bytes is the longest packet: 76 bits
    main.load_packet(Register::Id(1), &[0xC4, 0xD2, 0xDE, 0xFF, 0x00], 0)
        .unwrap();
    let (_, staged) = main.publisher().pending().unwrap();
    assert_eq!(staged.bit_count(), 76);
    assert!(staged.checksum_ok());
}

#[test]
fn speed_above_range_is_clamped() {
    let mut table: SlotTable<4> = SlotTable::new();
    let (publisher, _scheduler) = table.split();
    let mut main = test_channel(publisher);

    main.set_throttle(1, 3, 255, Direction::Reverse).unwrap();
    let (_, staged) = main.publisher().pending().unwrap();
    // Step 126 is the top: code 127, direction bit clear
    assert_eq!(staged.data_bytes().as_slice(), &[0x03, 0x3F, 0x7F, 0x43]);
}

// ============================================================================
// Tick side on its own thread
// ============================================================================

#[test]
fn commands_from_another_thread() {
    init_logging();
    let mut table: SlotTable<4> = SlotTable::new();
    let (publisher, scheduler) = table.split();
    let stop = AtomicBool::new(false);

    let mut main = Channel::new(
        publisher,
        MockPower::new(),
        MockSense::constant(0),
        StdDelay,
        ChannelConfig::main(),
    );

    let signal = thread::scope(|s| {
        let stop = &stop;
        let ticker = s.spawn(move || {
            let mut signal = TrackSignal::new(scheduler, MockSignal::new());
            while !stop.load(Ordering::Relaxed) {
                signal.tick();
            }
            signal
        });

        main.begin().unwrap();
        for step in 0..60u16 {
            let register = step % 3 + 1;
            main.set_throttle(register, register + 2, (step % 100) as u8, Direction::Forward)
                .unwrap();
        }

        stop.store(true, Ordering::Relaxed);
        ticker.join().unwrap()
    });

    assert_eq!(main.publisher().occupied(), 0b1110);
    assert_eq!(main.publisher().len(), 3);
    assert!(signal.packets_sent() > 0);
}

/// Samples for one verify: baseline then the ack window.
fn verify_window(ack: bool) -> Vec<u16> {
    let mut samples = vec![100; 4];
    samples.extend(std::iter::repeat(if ack { 300 } else { 100 }).take(8));
    samples
}

#[test]
fn programming_track_against_running_tick_side() {
    init_logging();
    let mut table: SlotTable<2> = SlotTable::new();
    let (publisher, scheduler) = table.split();
    let stop = AtomicBool::new(false);

    let channel = Channel::new(
        publisher,
        MockPower::new(),
        MockSense::default(),
        StdDelay,
        ChannelConfig::prog(),
    );
    let ack = AckConfig::default().with_base_samples(4).with_samples(8);
    let mut prog = ProgrammingTrack::new(channel, ack);

    let signal = thread::scope(|s| {
        let stop = &stop;
        let ticker = s.spawn(move || {
            let mut signal = TrackSignal::new(scheduler, MockSignal::new());
            while !stop.load(Ordering::Relaxed) {
                signal.tick();
            }
            signal
        });

        prog.begin().unwrap();
        prog.set_power(true);

        // Write: the verify after it is acknowledged
        prog.channel_mut().sense().push_samples(&verify_window(true));
        assert_eq!(prog.write_cv(29, 6), Ok(true));

        // Read 6: bits 1 and 2 ack, then the byte verify acks
        for bit in 0..8 {
            let window = verify_window(bit == 1 || bit == 2);
            prog.channel_mut().sense().push_samples(&window);
        }
        prog.channel_mut().sense().push_samples(&verify_window(true));
        assert_eq!(prog.read_cv(29), Ok(Some(6)));

        // Nothing answers
        for _ in 0..9 {
            prog.channel_mut().sense().push_samples(&verify_window(false));
        }
        assert_eq!(prog.read_cv(1), Ok(None));

        stop.store(true, Ordering::Relaxed);
        ticker.join().unwrap()
    });

    assert_eq!(prog.channel_mut().sense().remaining(), 0);
    // Every load went through the immediate slot
    assert_eq!(prog.channel().publisher().occupied(), 0);
    assert!(signal.packets_sent() > 0);
}
