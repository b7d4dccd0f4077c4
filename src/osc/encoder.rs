use nalgebra::Vector3;
use rosc::{encoder, OscBundle, OscMessage, OscPacket, OscTime, OscType};
use std::time::{SystemTime, UNIX_EPOCH};

use super::address::{round_to, Axis};
use super::head::HEAD_ADDRESS;
use crate::config::StreamSettings;
use crate::error::Result;
use crate::metrics;
use crate::sensor::DepthPoint;
use crate::skeleton::{JointId, JointSample, SkeletonSnapshot, SkeletonTrackingState};

/// 送信値の丸め桁数
pub const WIRE_DECIMALS: i32 = 4;
/// 深度画像上の位置を表示するときの丸め桁数
const SCREEN_DECIMALS: i32 = 3;
/// Animata 表示行の丸め桁数
const ANIMATA_TEXT_DECIMALS: i32 = 2;

/// Animata キャラクターのピクセルサイズ
pub const ANIMATA_CHARACTER_WIDTH: f64 = 900.0;
pub const ANIMATA_CHARACTER_HEIGHT: f64 = 600.0;

/// 1アドレス分のメッセージ
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundMessage {
    pub address: String,
    pub args: Vec<OscType>,
}

impl OutboundMessage {
    pub fn floats(address: String, values: &[f64]) -> Self {
        Self {
            address,
            args: values
                .iter()
                .map(|v| OscType::Float(round_to(*v, WIRE_DECIMALS) as f32))
                .collect(),
        }
    }
}

/// 1データグラム分。中のメッセージは同じキャプチャ時刻を共有する
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundPacket {
    pub timestamp: SystemTime,
    pub messages: Vec<OutboundMessage>,
}

/// UNIX時刻 → NTP時刻 (1900年起点)
const NTP_UNIX_OFFSET_SECS: u64 = 2_208_988_800;

fn osc_time(timestamp: SystemTime) -> OscTime {
    let since_unix = timestamp.duration_since(UNIX_EPOCH).unwrap_or_default();
    let seconds = (since_unix.as_secs() + NTP_UNIX_OFFSET_SECS) as u32;
    let fractional = ((u64::from(since_unix.subsec_nanos()) << 32) / 1_000_000_000) as u32;
    OscTime { seconds, fractional }
}

impl OutboundPacket {
    pub fn to_osc(&self) -> OscPacket {
        OscPacket::Bundle(OscBundle {
            timetag: osc_time(self.timestamp),
            content: self
                .messages
                .iter()
                .map(|m| {
                    OscPacket::Message(OscMessage {
                        addr: m.address.clone(),
                        args: m.args.clone(),
                    })
                })
                .collect(),
        })
    }

    /// OSCバンドルをバイト列にエンコード
    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(encoder::encode(&self.to_osc())?)
    }
}

/// 1スケルトン分のエンコード結果
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EncodedSkeleton {
    /// 送信するバンドル。文字列モードや対象関節なしなら None
    pub packet: Option<OutboundPacket>,
    /// 表示用テキスト
    pub text: String,
}

/// Animata 用の頭の位置 (x, y, z)
///
/// 推定身長で正規化してキャラクターのピクセル寸法に合わせる。
/// Animata は左上原点なので Y を反転する。
pub fn animata_head(head: &Vector3<f32>, player_height: f64, scale: f64) -> [f64; 3] {
    let x = f64::from(head.x) / player_height * ANIMATA_CHARACTER_WIDTH * scale;
    let y = f64::from(head.y) / -player_height * ANIMATA_CHARACTER_HEIGHT * scale;
    let z = f64::from(head.z);
    [x, y, z]
}

/// 送信対象のスケルトンを選ぶ
///
/// Tracked のみ。`track_nearest_only` なら、NotTracked 以外で
/// tracking_id > 0 のうち最も Z が小さい1人に絞る。
pub fn select_skeletons<'a>(
    settings: &StreamSettings,
    skeletons: &'a [SkeletonSnapshot],
) -> Vec<(usize, &'a SkeletonSnapshot)> {
    if settings.track_nearest_only {
        let nearest = skeletons
            .iter()
            .enumerate()
            .filter(|(_, s)| s.state != SkeletonTrackingState::NotTracked && s.tracking_id > 0)
            .min_by(|(_, a), (_, b)| a.position.z.total_cmp(&b.position.z));
        return nearest
            .filter(|(_, s)| s.state == SkeletonTrackingState::Tracked)
            .into_iter()
            .collect();
    }
    skeletons
        .iter()
        .enumerate()
        .filter(|(_, s)| s.state == SkeletonTrackingState::Tracked)
        .collect()
}

/// スケルトン1人分をエンコード
///
/// `counter` はフレーム内のスケルトン番号。`screen` は関節の深度画像位置
/// （百分率モード用）。NotTracked の関節は一切出力しない。
pub fn encode_skeleton(
    settings: &StreamSettings,
    counter: i32,
    skeleton: &SkeletonSnapshot,
    screen: &dyn Fn(JointId) -> Option<DepthPoint>,
    captured_at: SystemTime,
) -> EncodedSkeleton {
    if settings.animata {
        return encode_head_only(settings, counter, skeleton, captured_at);
    }

    let mut messages = Vec::new();
    let mut text = String::new();

    for joint in skeleton.usable_joints() {
        let Some((values, text_decimals)) = joint_values(settings, joint, screen) else {
            continue;
        };
        let name = joint.id.name();
        let mode = &settings.address_mode;

        if settings.show_data {
            let line: Vec<String> = Axis::ALL
                .iter()
                .zip(values.iter())
                .map(|(axis, v)| mode.axis_entry(counter, name, *axis, round_to(*v, text_decimals)))
                .collect();
            text.push_str(&line.join(" "));
            text.push('\n');
        }

        if settings.send_as_string {
            continue;
        }
        if settings.send_all_separately {
            for (axis, v) in Axis::ALL.iter().zip(values.iter()) {
                messages.push(OutboundMessage::floats(mode.axis_path(counter, name, *axis), &[*v]));
            }
        } else {
            messages.push(OutboundMessage::floats(mode.joint_path(counter, name), &values));
        }
    }

    let packet = (!messages.is_empty()).then(|| OutboundPacket {
        timestamp: captured_at,
        messages,
    });
    EncodedSkeleton { packet, text }
}

/// メートル座標、または百分率モードなら深度画像上の位置 + Z
fn joint_values(
    settings: &StreamSettings,
    joint: &JointSample,
    screen: &dyn Fn(JointId) -> Option<DepthPoint>,
) -> Option<([f64; 3], i32)> {
    let z = f64::from(joint.position.z);
    if settings.positions_as_percentage {
        let (px, py) = screen(joint.id)?.percent();
        return Some(([f64::from(px), f64::from(py), z], SCREEN_DECIMALS));
    }
    Some((
        [f64::from(joint.position.x), f64::from(joint.position.y), z],
        WIRE_DECIMALS,
    ))
}

/// Animata 互換: 頭だけを `/head` に1バンドル
fn encode_head_only(
    settings: &StreamSettings,
    counter: i32,
    skeleton: &SkeletonSnapshot,
    captured_at: SystemTime,
) -> EncodedSkeleton {
    let head = skeleton.joint(JointId::Head);
    if !head.state.is_usable() {
        return EncodedSkeleton::default();
    }
    // 身長計算に使う関節が欠けていたらこのフレームは出さない
    let Some(height) = metrics::estimate_height_checked(skeleton) else {
        return EncodedSkeleton::default();
    };

    let values = animata_head(&head.position, f64::from(height.meters), settings.animata_scale);

    let text = if settings.show_data {
        format!(
            "\n\ns{}{} {} {} {}",
            counter,
            JointId::Head.name(),
            round_to(values[0], ANIMATA_TEXT_DECIMALS),
            round_to(values[1], ANIMATA_TEXT_DECIMALS),
            round_to(values[2], ANIMATA_TEXT_DECIMALS),
        )
    } else {
        String::new()
    };

    let packet = (!settings.send_as_string).then(|| OutboundPacket {
        timestamp: captured_at,
        messages: vec![OutboundMessage::floats(HEAD_ADDRESS.to_string(), &values)],
    });
    EncodedSkeleton { packet, text }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::osc::AddressMode;
    use crate::skeleton::TrackingState;
    use approx::assert_relative_eq;

    fn metric_settings() -> StreamSettings {
        StreamSettings {
            animata: false,
            positions_as_percentage: false,
            ..StreamSettings::default()
        }
    }

    fn no_screen(_: JointId) -> Option<DepthPoint> {
        None
    }

    fn standing(tracking_id: i32, z: f32) -> SkeletonSnapshot {
        let mut skel = SkeletonSnapshot::empty(tracking_id);
        skel.state = SkeletonTrackingState::Tracked;
        skel.position = Vector3::new(0.0, 0.9, z);
        let joints = [
            (JointId::Head, 0.0, 1.6),
            (JointId::ShoulderCenter, 0.0, 1.4),
            (JointId::Spine, 0.0, 1.1),
            (JointId::HipCenter, 0.0, 0.9),
            (JointId::HipRight, 0.1, 0.9),
            (JointId::KneeRight, 0.1, 0.5),
            (JointId::AnkleRight, 0.1, 0.1),
            (JointId::FootRight, 0.1, 0.0),
        ];
        for (id, x, y) in joints {
            skel.set_joint(id, Vector3::new(x, y, z), TrackingState::Tracked);
        }
        skel
    }

    #[test]
    fn test_bundle_rounding_is_exact() {
        let mut skel = SkeletonSnapshot::empty(1);
        skel.state = SkeletonTrackingState::Tracked;
        skel.set_joint(JointId::Head, Vector3::new(1.2345, -0.6789, 2.0001), TrackingState::Tracked);

        let out = encode_skeleton(&metric_settings(), 1, &skel, &no_screen, SystemTime::now());
        let packet = out.packet.unwrap();
        assert_eq!(packet.messages.len(), 1);
        assert_eq!(packet.messages[0].address, "/skeleton1/Head");
        assert_eq!(
            packet.messages[0].args,
            vec![
                OscType::Float(1.2345),
                OscType::Float(-0.6789),
                OscType::Float(2.0001)
            ]
        );
    }

    #[test]
    fn test_not_tracked_joints_are_skipped() {
        let mut skel = standing(1, 2.0);
        skel.set_joint(JointId::Head, Vector3::new(5.0, 5.0, 5.0), TrackingState::NotTracked);

        let out = encode_skeleton(&metric_settings(), 1, &skel, &no_screen, SystemTime::now());
        let packet = out.packet.unwrap();
        assert_eq!(packet.messages.len(), 7);
        assert!(packet.messages.iter().all(|m| !m.address.contains("Head")));
    }

    #[test]
    fn test_separate_messages_positional() {
        let settings = StreamSettings {
            send_all_separately: true,
            address_mode: AddressMode::from_base("/foo"),
            ..metric_settings()
        };
        let mut skel = SkeletonSnapshot::empty(1);
        skel.state = SkeletonTrackingState::Tracked;
        skel.set_joint(JointId::Head, Vector3::new(0.5, 1.0, 2.0), TrackingState::Inferred);

        let out = encode_skeleton(&settings, 5, &skel, &no_screen, SystemTime::now());
        let packet = out.packet.unwrap();
        let addrs: Vec<&str> = packet.messages.iter().map(|m| m.address.as_str()).collect();
        assert_eq!(addrs, vec!["/foo2", "/foo3", "/foo4"]);
        assert_eq!(packet.messages[1].args, vec![OscType::Float(1.0)]);
    }

    #[test]
    fn test_string_mode_never_produces_packet() {
        let settings = StreamSettings {
            send_as_string: true,
            show_data: true,
            ..metric_settings()
        };
        let mut skel = SkeletonSnapshot::empty(1);
        skel.state = SkeletonTrackingState::Tracked;
        skel.set_joint(JointId::Head, Vector3::new(1.2345, -0.6789, 2.0), TrackingState::Tracked);

        let out = encode_skeleton(&settings, 1, &skel, &no_screen, SystemTime::now());
        assert!(out.packet.is_none());
        assert_eq!(
            out.text,
            "/skeleton1/Head/x1.2345 /skeleton1/Head/y-0.6789 /skeleton1/Head/z2\n"
        );
    }

    #[test]
    fn test_positional_text_line() {
        let settings = StreamSettings {
            show_data: true,
            address_mode: AddressMode::from_base("foo"),
            ..metric_settings()
        };
        let mut skel = SkeletonSnapshot::empty(1);
        skel.state = SkeletonTrackingState::Tracked;
        skel.set_joint(JointId::Head, Vector3::new(0.5, 0.25, 2.0), TrackingState::Tracked);

        let out = encode_skeleton(&settings, 5, &skel, &no_screen, SystemTime::now());
        assert_eq!(out.text, "/foo2/0.5 /foo3/0.25 /foo4/2\n");
    }

    #[test]
    fn test_percentage_mode_uses_screen_position() {
        let settings = StreamSettings {
            positions_as_percentage: true,
            ..metric_settings()
        };
        let mut skel = SkeletonSnapshot::empty(1);
        skel.state = SkeletonTrackingState::Tracked;
        skel.set_joint(JointId::Head, Vector3::new(0.0, 0.0, 2.0), TrackingState::Tracked);
        skel.set_joint(JointId::Spine, Vector3::new(0.0, 0.0, 2.0), TrackingState::Tracked);

        let screen = |id: JointId| match id {
            JointId::Head => Some(DepthPoint::new(320.0, 120.0)),
            _ => None,
        };
        let out = encode_skeleton(&settings, 1, &skel, &screen, SystemTime::now());
        let packet = out.packet.unwrap();
        // 写像できない関節は出さない
        assert_eq!(packet.messages.len(), 1);
        assert_eq!(
            packet.messages[0].args,
            vec![OscType::Float(50.0), OscType::Float(25.0), OscType::Float(2.0)]
        );
    }

    #[test]
    fn test_animata_head_only() {
        let settings = StreamSettings {
            show_data: true,
            ..StreamSettings::default()
        };
        let skel = standing(1, 2.0);
        let out = encode_skeleton(&settings, 1, &skel, &no_screen, SystemTime::now());

        let packet = out.packet.unwrap();
        assert_eq!(packet.messages.len(), 1);
        assert_eq!(packet.messages[0].address, "/head");

        // 身長 1.7m, 頭 (0, 1.6, 2.0)
        let OscType::Float(y) = packet.messages[0].args[1] else {
            panic!("expected float");
        };
        assert_relative_eq!(y as f64, -1.6 / 1.7 * 600.0, epsilon = 1e-3);
        assert_eq!(packet.messages[0].args[2], OscType::Float(2.0));
        assert!(out.text.starts_with("\n\ns1Head 0 "));
    }

    #[test]
    fn test_animata_string_mode_is_text_only() {
        let settings = StreamSettings {
            send_as_string: true,
            show_data: true,
            ..StreamSettings::default()
        };
        let out = encode_skeleton(&settings, 1, &standing(1, 2.0), &no_screen, SystemTime::now());
        assert!(out.packet.is_none());
        assert!(out.text.starts_with("\n\ns1Head "));
    }

    #[test]
    fn test_animata_scale() {
        let head = Vector3::new(0.5, 1.0, 2.0);
        let [x1, y1, _] = animata_head(&head, 2.0, 1.0);
        let [x2, y2, z2] = animata_head(&head, 2.0, 2.0);
        assert_relative_eq!(x1, 225.0);
        assert_relative_eq!(y1, -300.0);
        assert_relative_eq!(x2, 2.0 * x1);
        assert_relative_eq!(y2, 2.0 * y1);
        assert_relative_eq!(z2, 2.0);
    }

    #[test]
    fn test_animata_skips_untracked_head() {
        let mut skel = standing(1, 2.0);
        skel.set_joint(JointId::Head, Vector3::zeros(), TrackingState::NotTracked);
        let out = encode_skeleton(&StreamSettings::default(), 1, &skel, &no_screen, SystemTime::now());
        assert_eq!(out, EncodedSkeleton::default());
    }

    #[test]
    fn test_animata_skips_when_height_unusable() {
        let mut skel = standing(1, 2.0);
        skel.set_joint(JointId::KneeRight, Vector3::zeros(), TrackingState::NotTracked);
        let out = encode_skeleton(&StreamSettings::default(), 1, &skel, &no_screen, SystemTime::now());
        assert!(out.packet.is_none());
    }

    #[test]
    fn test_select_all_tracked() {
        let mut far = standing(2, 3.0);
        far.state = SkeletonTrackingState::PositionOnly;
        let skeletons = vec![standing(1, 2.5), far, standing(3, 1.5)];

        let selected = select_skeletons(&StreamSettings::default(), &skeletons);
        let ids: Vec<i32> = selected.iter().map(|(_, s)| s.tracking_id).collect();
        assert_eq!(ids, vec![1, 3]);
    }

    #[test]
    fn test_select_nearest_only() {
        let settings = StreamSettings {
            track_nearest_only: true,
            ..StreamSettings::default()
        };
        let mut ghost = standing(0, 0.5);
        ghost.state = SkeletonTrackingState::Tracked;
        let skeletons = vec![standing(1, 2.5), ghost, standing(3, 1.5)];

        let selected = select_skeletons(&settings, &skeletons);
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].1.tracking_id, 3);
        assert_eq!(selected[0].0, 2);
    }

    #[test]
    fn test_select_nearest_position_only_yields_nothing() {
        let settings = StreamSettings {
            track_nearest_only: true,
            ..StreamSettings::default()
        };
        let mut near = standing(4, 1.0);
        near.state = SkeletonTrackingState::PositionOnly;
        let skeletons = vec![standing(1, 2.5), near];
        assert!(select_skeletons(&settings, &skeletons).is_empty());
    }

    #[test]
    fn test_packet_encodes_as_bundle() {
        let packet = OutboundPacket {
            timestamp: UNIX_EPOCH + std::time::Duration::from_millis(1500),
            messages: vec![OutboundMessage::floats("/head".to_string(), &[1.0, 2.0, 3.0])],
        };
        let OscPacket::Bundle(bundle) = packet.to_osc() else {
            panic!("expected bundle");
        };
        assert_eq!(bundle.timetag.seconds, (1 + NTP_UNIX_OFFSET_SECS) as u32);
        assert_eq!(bundle.timetag.fractional, 1 << 31);
        assert_eq!(bundle.content.len(), 1);
        assert!(!packet.encode().unwrap().is_empty());
    }
}
