//! Demonstration of the FormCheck shot segmenter.
//!
//! This example shows how to:
//! 1. Build pose frames for a right-handed shooter
//! 2. Feed them through a shot detector
//! 3. Turn detected shots into reports with a form assessment
//! 4. Summarize the session
//!
//! Run with: cargo run --example segment_demo

use formcheck_segmenter::{
    core::{assess, FormGrade, ReportBuilder, SessionSummary, ShotDetector},
    pose::{Joint, JointPosition, PoseFrame},
    EngineConfig, LeadSide,
};

const FRAME_MS: f64 = 1000.0 / 30.0;

fn main() {
    println!("FormCheck Segmenter - Segmentation Demo");
    println!("=======================================");
    println!();

    let config = EngineConfig::for_side(LeadSide::Right);
    let mut detector = match ShotDetector::new(config) {
        Ok(detector) => detector,
        Err(e) => {
            eprintln!("Invalid engine config: {e}");
            return;
        }
    };
    let builder = ReportBuilder::new(LeadSide::Right).with_session_id("DEMO".to_string());

    // Three shots with progressively deeper loads.
    let mut angles = Vec::new();
    for load in [100.0, 90.0, 78.0] {
        angles.extend(motion(load));
    }
    println!("Synthesized {} frames at 30 fps", angles.len());
    println!();

    let mut reports = Vec::new();
    for (index, &(angle, raised)) in angles.iter().enumerate() {
        let mut frame = arm_frame(angle, raised);
        frame.timestamp_ms = index as f64 * FRAME_MS;

        let Some(event) = detector.ingest(frame) else {
            continue;
        };

        let form = assess(&event);
        println!(
            "Shot {}: frames {}..{} ({:.2}s), load {:.1}°, release {:.1}°",
            event.shot_number,
            event.release_sequence - event.duration_frames as u64,
            event.release_sequence,
            event.duration_frames as f64 * FRAME_MS / 1000.0,
            event.load_angle,
            event.release_angle
        );
        for metric in form.metrics() {
            let mark = match metric.grade {
                FormGrade::Within => "ok",
                FormGrade::Below => "low",
                FormGrade::Above => "high",
            };
            println!(
                "  {:?}: {:.2} ({mark}, {:+.2} from ideal)",
                metric.metric, metric.value, metric.deviation
            );
        }
        reports.push(builder.build(&event));
    }

    println!();
    if let Some(first) = reports.first() {
        println!("First report:");
        match serde_json::to_string_pretty(&first.metrics) {
            Ok(json) => println!("{json}"),
            Err(e) => eprintln!("Failed to serialize report: {e}"),
        }
        println!();
    }

    let summary = SessionSummary::from_reports(&reports);
    println!("Session: {} shot(s)", summary.shots);
    if let Some(load) = summary.load_angle {
        println!(
            "  Load angle: mean {:.1}°, range {:.1}°..{:.1}°",
            load.mean, load.min, load.max
        );
    }
    if let Some(metric) = summary.most_consistent {
        println!("  Most consistent: {metric}");
    }

    let counters = detector.counters();
    println!();
    println!(
        "Detector: {} frames, {} candidates, {} rejected, {} suppressed",
        counters.frames_ingested,
        counters.candidates_fired,
        counters.candidates_rejected,
        counters.cooldown_suppressed
    );
}

/// Stance, dip to `load`, rise to release, then recovery.
fn motion(load: f64) -> Vec<(f64, bool)> {
    let mut frames = Vec::new();
    frames.extend(std::iter::repeat((170.0, false)).take(40));
    for k in 1..=20 {
        frames.push((170.0 + (load - 170.0) * k as f64 / 20.0, false));
    }
    for k in 1..=15 {
        frames.push((load + (172.0 - load) * k as f64 / 15.0, k == 15));
    }
    frames.extend(std::iter::repeat((172.0, true)).take(5));
    frames
}

fn arm_frame(angle: f64, raised: bool) -> PoseFrame {
    let shoulder = (0.5, 0.4);
    let elbow = (0.65, 0.4);
    let theta = angle.to_radians();
    let dy = if raised { -theta.sin() } else { theta.sin() };
    let wrist = (elbow.0 - 0.15 * theta.cos(), elbow.1 + 0.15 * dy);

    let mut frame = PoseFrame::default();
    for (joint, (x, y)) in [
        (Joint::RightShoulder, shoulder),
        (Joint::RightElbow, elbow),
        (Joint::RightWrist, wrist),
        (Joint::RightHip, (0.5, 0.7)),
        (Joint::RightKnee, (0.45, 0.85)),
        (Joint::RightAnkle, (0.5, 1.0)),
    ] {
        frame.landmarks.insert(joint, JointPosition::planar(x, y));
        frame.visibility.insert(joint, 0.95);
    }
    frame
}
