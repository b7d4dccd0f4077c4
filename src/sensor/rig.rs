use std::sync::Arc;

use super::located::{LocatedSensor, SensorPose};
use super::source::{SensorBackend, SensorFrameSource};

/// 起動時に接続されていたセンサー群
pub struct SensorRig {
    sensors: Vec<Arc<LocatedSensor>>,
}

impl SensorRig {
    /// 接続中のセンサーを全て開始する
    ///
    /// 開始できなかったセンサーは除外して続行。
    /// `pose_for` が None を返したセンサーは座標変換なし。
    pub fn start<F>(backend: &dyn SensorBackend, pose_for: F) -> Self
    where
        F: Fn(&str) -> Option<SensorPose>,
    {
        Self::from_sources(backend.connected_sensors(), pose_for)
    }

    pub fn from_sources<F>(sources: Vec<Arc<dyn SensorFrameSource>>, pose_for: F) -> Self
    where
        F: Fn(&str) -> Option<SensorPose>,
    {
        let mut sensors = Vec::new();
        for source in sources {
            if let Err(e) = source.start() {
                log::warn!("{}", e);
                continue;
            }
            let pose = pose_for(source.id());
            log::info!(
                "Sensor {} started{}",
                source.id(),
                if pose.is_some() { " (located)" } else { "" }
            );
            sensors.push(Arc::new(LocatedSensor::new(source, pose)));
        }
        Self { sensors }
    }

    pub fn sensors(&self) -> &[Arc<LocatedSensor>] {
        &self.sensors
    }

    pub fn is_empty(&self) -> bool {
        self.sensors.is_empty()
    }

    pub fn stop(&self) {
        for sensor in &self.sensors {
            sensor.stop();
        }
    }
}

impl Drop for SensorRig {
    fn drop(&mut self) {
        self.stop();
    }
}
