use anyhow::Result;
use nalgebra::Vector3;
use std::io::{self, Write};
use std::sync::Arc;
use std::time::Duration;

use skeleton_osc::config::{parse_port, Config, SharedSettings, StreamSettings};
use skeleton_osc::osc::StreamTransport;
use skeleton_osc::pipeline::{Sinks, StreamPipeline, TextSink, VisualizationSink};
use skeleton_osc::sensor::{ManualSensor, SensorFrameSource, SensorRig, SensorSnapshot};
use skeleton_osc::skeleton::{
    drawable_bones, BoneStyle, JointId, SkeletonSnapshot, SkeletonTrackingState, TrackingState,
};

const CONFIG_PATH: &str = "config.toml";
const MANUAL_SENSOR_ID: &str = "manual0";

struct ConsoleText;

impl TextSink for ConsoleText {
    fn show(&mut self, text: &str) {
        println!("{}", text.trim_end());
    }
}

/// 描画の代わりに骨の数を表示
struct ConsoleBones;

impl VisualizationSink for ConsoleBones {
    fn render(&mut self, sensor: &str, snapshot: &SensorSnapshot) {
        for (i, skel) in snapshot.relative.iter().enumerate() {
            let (tracked, inferred) =
                drawable_bones(skel).fold((0, 0), |(t, n), (_, _, style)| match style {
                    BoneStyle::Tracked => (t + 1, n),
                    BoneStyle::Inferred => (t, n + 1),
                });
            println!(
                "  [{}] skeleton {} bones: {} tracked, {} inferred",
                sensor,
                i + 1,
                tracked,
                inferred
            );
        }
    }
}

/// テスト用の立ち姿勢（足元 y=0, 身長おおよそ 1.7m）
fn demo_skeleton(offset_x: f32, z: f32) -> SkeletonSnapshot {
    let mut skel = SkeletonSnapshot::empty(1);
    skel.state = SkeletonTrackingState::Tracked;
    skel.position = Vector3::new(offset_x, 0.9, z);
    let joints = [
        (JointId::Head, 0.0, 1.6),
        (JointId::ShoulderCenter, 0.0, 1.4),
        (JointId::ShoulderLeft, -0.2, 1.4),
        (JointId::ShoulderRight, 0.2, 1.4),
        (JointId::Spine, 0.0, 1.1),
        (JointId::HipCenter, 0.0, 0.9),
        (JointId::HipLeft, -0.1, 0.9),
        (JointId::KneeLeft, -0.1, 0.5),
        (JointId::AnkleLeft, -0.1, 0.1),
        (JointId::FootLeft, -0.1, 0.0),
        (JointId::HipRight, 0.1, 0.9),
        (JointId::KneeRight, 0.1, 0.5),
        (JointId::AnkleRight, 0.1, 0.1),
        (JointId::FootRight, 0.1, 0.0),
    ];
    for (id, x, y) in joints {
        skel.set_joint(id, Vector3::new(offset_x + x, y, z), TrackingState::Tracked);
    }
    skel
}

fn on_off(flag: bool) -> &'static str {
    if flag {
        "ON"
    } else {
        "OFF"
    }
}

fn print_status(settings: &StreamSettings, transport: &StreamTransport) {
    println!("送信先: {}", transport.destination());
    println!("  アドレス:      {:?}", settings.address_mode);
    println!("  OSC送信:       {}", on_off(settings.osc_enabled));
    println!("  データ表示:    {}", on_off(settings.show_data));
    println!("  文字列モード:  {}", on_off(settings.send_as_string));
    println!("  スケルトン描画: {}", on_off(settings.draw_skeleton));
    println!("  最も近い1人:   {}", on_off(settings.track_nearest_only));
    println!("  百分率:        {}", on_off(settings.positions_as_percentage));
    println!("  軸ごとに送信:  {}", on_off(settings.send_all_separately));
    println!(
        "  Animata:       {} (scale {})",
        on_off(settings.animata),
        settings.animata_scale
    );
}

/// トグル系コマンド
fn toggle(settings: &SharedSettings, name: &str) -> Option<bool> {
    let mut value = None;
    let result = settings.update(|mut s| {
        let flag = match name {
            "osc" => &mut s.osc_enabled,
            "show" => &mut s.show_data,
            "str" => &mut s.send_as_string,
            "draw" => &mut s.draw_skeleton,
            "near" => &mut s.track_nearest_only,
            "pct" => &mut s.positions_as_percentage,
            "sep" => &mut s.send_all_separately,
            "anim" => &mut s.animata,
            _ => return Ok(s),
        };
        *flag = !*flag;
        value = Some(*flag);
        Ok(s)
    });
    result.ok().and(value)
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Config::load_or_default(CONFIG_PATH);
    let settings = SharedSettings::new(config.settings());
    let transport = Arc::new(StreamTransport::new(&config.osc.host, config.osc.port)?);

    println!("=== Skeleton OSC ({}) ===", env!("GIT_VERSION"));
    println!("送信先: {}", transport.destination());
    println!();
    println!("コマンド:");
    println!("  h host        - 送信先ホストを設定");
    println!("  p port        - 送信先ポートを設定");
    println!("  a [address]   - ベースアドレスを設定 (空で /skeleton 形式)");
    println!("  sc scale      - Animata スケールを設定");
    println!("  osc|show|str|draw|near|pct|sep|anim - 各設定を切り替え");
    println!("  i             - 現在の設定を表示");
    println!("  s             - テストフレームを1つ送信");
    println!("  t             - テスト送信 (横に少しずつ動かす)");
    println!("  q             - 終了");
    println!();

    let manual = Arc::new(ManualSensor::new(MANUAL_SENSOR_ID));
    let rig = SensorRig::from_sources(
        vec![manual.clone() as Arc<dyn SensorFrameSource>],
        |id| config.sensor_pose(id),
    );
    let mut pipeline = StreamPipeline::spawn(
        rig.sensors(),
        settings.clone(),
        transport.clone(),
        Sinks {
            text: Some(Box::new(ConsoleText)),
            visualization: Some(Box::new(ConsoleBones)),
        },
    );

    let mut host = config.osc.host.clone();
    let mut port = config.osc.port;

    loop {
        print!("> ");
        io::stdout().flush()?;

        let mut input = String::new();
        if io::stdin().read_line(&mut input)? == 0 {
            break;
        }
        let parts: Vec<&str> = input.split_whitespace().collect();

        if parts.is_empty() {
            continue;
        }

        match parts[0] {
            "h" if parts.len() == 2 => match transport.configure(parts[1], port) {
                Ok(()) => {
                    host = parts[1].to_string();
                    println!("送信先: {}", transport.destination());
                }
                Err(e) => println!("{}", e),
            },
            "p" if parts.len() == 2 => {
                match parse_port(parts[1]).and_then(|p| transport.configure(&host, p).map(|_| p)) {
                    Ok(p) => {
                        port = p;
                        println!("送信先: {}", transport.destination());
                    }
                    Err(e) => println!("{}", e),
                }
            }
            "a" => {
                let address = parts.get(1).copied().unwrap_or("");
                if settings.update(|s| Ok(s.with_address(address))).is_ok() {
                    println!("アドレス: {:?}", settings.current().address_mode);
                }
            }
            "sc" if parts.len() == 2 => match settings.update(|s| s.with_scale_text(parts[1])) {
                Ok(()) => println!("スケール: {}", settings.current().animata_scale),
                Err(e) => println!("{}", e),
            },
            "i" => print_status(&settings.current(), &transport),
            "s" => {
                let seq = manual.push_skeletons(vec![demo_skeleton(0.0, 2.0)]);
                println!("フレーム {} を送信しました", seq);
            }
            "t" => {
                println!("テスト送信中...");
                for i in 0..10 {
                    let x = i as f32 * 0.1 - 0.5;
                    manual.push_skeletons(vec![demo_skeleton(x, 2.0)]);
                    println!("  x = {:.1}", x);
                    std::thread::sleep(Duration::from_millis(500));
                }
                println!("テスト完了");
            }
            "q" => {
                println!("終了します");
                break;
            }
            name => match toggle(&settings, name) {
                Some(flag) => println!("{}: {}", name, on_off(flag)),
                None => println!("不明なコマンド: {}", parts[0]),
            },
        }

        if let Some(e) = pipeline.stats().take_last_error() {
            println!("送信エラー: {}", e);
        }
    }

    pipeline.shutdown();
    rig.stop();
    log::info!(
        "{} frames, {} packets sent, {} failures",
        pipeline.stats().frames(),
        pipeline.stats().packets_sent(),
        pipeline.stats().send_failures()
    );
    Ok(())
}
