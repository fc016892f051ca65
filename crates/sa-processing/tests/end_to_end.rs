//! Sender → link → receiver runs on simulated time

use sa_core::{encode_frame, FrameDecoder, RawSample, SampleSource};
use sa_processing::averager::WRITE_START;
use sa_processing::{
    LinkConfig, LinkFault, LinkScheduler, OutputChannel, Pipeline, ProcessingConfig,
    RecordingSink, TEMPLATE_LEN,
};
use sa_simulation::{format_record, parse_record, EcgConfig, EcgSimulator, NoiseConfig, RecordPlayer};

const TICK_RATE: f32 = 200.0;

fn ecg(sampling_rate: f32, heart_rate_bpm: f32) -> EcgSimulator {
    EcgSimulator::new(EcgConfig {
        sampling_rate,
        heart_rate_bpm,
        ..EcgConfig::default()
    })
    .unwrap()
}

/// Onsets after the start-up transient has settled
fn settled_onsets(sink: &RecordingSink, after_tick: u64) -> Vec<u64> {
    sink.onset_ticks().into_iter().filter(|&t| t >= after_tick).collect()
}

#[test]
fn matched_link_detects_every_beat() {
    let processing = ProcessingConfig::reference();
    let link = LinkConfig::matched(&processing);
    let mut scheduler = LinkScheduler::new(ecg(TICK_RATE, 60.0), processing, link).unwrap();

    let mut sink = RecordingSink::new();
    let report = scheduler.run_for_ticks(60 * 200, &mut sink).unwrap();
    assert_eq!(report.decoder.dropped_bytes, 0);

    // One beat per second from 5 s to 60 s
    let onsets = settled_onsets(&sink, 1000);
    assert!((54..=56).contains(&onsets.len()), "{} onsets", onsets.len());
    for pair in onsets.windows(2) {
        assert!((195..=205).contains(&(pair[1] - pair[0])), "{:?}", pair);
    }
}

#[test]
fn averaged_template_contains_the_qrs_complex() {
    let processing = ProcessingConfig::reference();
    let link = LinkConfig::matched(&processing);
    let mut scheduler = LinkScheduler::new(ecg(TICK_RATE, 60.0), processing, link).unwrap();

    let mut sink = RecordingSink::new();
    scheduler.run_for_ticks(40 * 200, &mut sink).unwrap();

    let summary = scheduler.pipeline().summary();
    assert!(summary.templates_published >= 1);

    let template = scheduler.pipeline().template().unwrap();
    let (peak_index, peak) = template
        .iter()
        .copied()
        .enumerate()
        .fold((0, f32::MIN), |best, (i, v)| if v > best.1 { (i, v) } else { best });

    // The R wave precedes detection, so it lands in the retroactive part
    assert!(peak_index > WRITE_START && peak_index < TEMPLATE_LEN, "peak at {}", peak_index);
    assert!(peak > 0.65, "peak {}", peak);

    // The live channel replays the template during each beat
    let averaged = sink.channel(OutputChannel::Averaged);
    assert!(averaged.iter().skip(35 * 200).any(|&v| v > 0.6));
}

#[test]
fn reference_rates_keep_the_real_time_beat_rate() {
    let processing = ProcessingConfig::reference();
    let link = LinkConfig::reference();
    let mut scheduler = LinkScheduler::new(ecg(360.0, 60.0), processing, link).unwrap();

    let mut sink = RecordingSink::new();
    let report = scheduler.run_for_ticks(30 * 200, &mut sink).unwrap();

    // 360 frames per second arrive, 200 are sampled
    assert!(report.frames_sent >= 30 * 360 - 2);
    let onsets = settled_onsets(&sink, 1000);
    assert!((24..=26).contains(&onsets.len()), "{} onsets", onsets.len());
}

#[test]
fn recorded_waveform_plays_on_a_loop() {
    let mut simulator = EcgSimulator::new(EcgConfig {
        sampling_rate: TICK_RATE,
        heart_rate_bpm: 60.0,
        noise: NoiseConfig::none(),
        ..EcgConfig::default()
    })
    .unwrap();
    // Ten seconds of record, played from the second beat onwards
    let record = format_record(&simulator.generate(10.0)).unwrap();
    let samples = parse_record(&record).unwrap();
    let player = RecordPlayer::new(samples, 200, 0).unwrap();

    let processing = ProcessingConfig::reference();
    let link = LinkConfig::matched(&processing);
    let mut scheduler = LinkScheduler::new(player, processing, link).unwrap();
    let mut sink = RecordingSink::new();
    let report = scheduler.run_for_ticks(40 * 200, &mut sink).unwrap();

    assert!(!report.source_exhausted);
    let onsets = settled_onsets(&sink, 1000);
    assert!((34..=36).contains(&onsets.len()), "{} onsets", onsets.len());
}

#[test]
fn occasional_byte_loss_does_not_stop_detection() {
    let processing = ProcessingConfig::reference();
    let link = LinkConfig::matched(&processing);
    // Lose the high byte of frame 1000. ECG samples never have a zero high
    // byte, so the decoder realigns on the following frame
    let mut scheduler = LinkScheduler::new(ecg(TICK_RATE, 60.0), processing, link)
        .unwrap()
        .with_fault(LinkFault::DropRange { from: 3001, count: 1 });

    let mut sink = RecordingSink::new();
    let report = scheduler.run_for_ticks(30 * 200, &mut sink).unwrap();

    assert_eq!(report.bytes_lost, 1);
    assert!(report.decoder.resyncs >= 1);
    assert!(!settled_onsets(&sink, 3000).is_empty());
}

#[test]
fn decoder_and_pipeline_agree_with_direct_feed() {
    let mut source = ecg(TICK_RATE, 75.0);
    let samples: Vec<RawSample> = (0..2000).filter_map(|_| source.next_sample()).collect();

    // Through the codec byte by byte
    let mut decoder = FrameDecoder::new();
    let mut via_link = Pipeline::new(ProcessingConfig::reference()).unwrap();
    let mut linked = Vec::with_capacity(samples.len());
    for &sample in &samples {
        let value = decoder.feed(&encode_frame(sample)).unwrap();
        linked.push(via_link.tick(value));
    }

    let mut direct = Pipeline::new(ProcessingConfig::reference()).unwrap();
    assert_eq!(direct.process_block(&samples), linked);
}
