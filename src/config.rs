use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use crate::detect::{
    ClassifierPolicy, DetectionClassifier, DEFAULT_BRAND_COMPONENT_ID,
    DEFAULT_PLATE_COMPONENT_ID, DEFAULT_VEHICLE_CLASS_IDS,
};
use crate::link::{SpatialLinker, TieBreak, DEFAULT_IOU_THRESHOLD};
use crate::sink::{ResultSink, DEFAULT_LOG_FILE_PATH};

#[derive(Debug, Deserialize, Default)]
struct LinkerConfigFile {
    log_file_path: Option<PathBuf>,
    iou_threshold: Option<f32>,
    vehicle_class_ids: Option<Vec<i32>>,
    plate_component_id: Option<i32>,
    brand_component_id: Option<i32>,
    tie_break: Option<TieBreak>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LinkerConfig {
    pub log_file_path: PathBuf,
    pub iou_threshold: f32,
    pub vehicle_class_ids: BTreeSet<i32>,
    pub plate_component_id: i32,
    pub brand_component_id: i32,
    pub tie_break: TieBreak,
}

impl Default for LinkerConfig {
    fn default() -> Self {
        Self::from_file(LinkerConfigFile::default())
    }
}

impl LinkerConfig {
    /// Built-in defaults, then the file named by `LINKER_CONFIG`, then
    /// `LINKER_*` environment overrides.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("LINKER_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) if !path.trim().is_empty() => Some(read_config_file(Path::new(path))?),
            _ => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default());
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Loads a config file without consulting the environment.
    pub fn from_path(path: &Path) -> Result<Self> {
        let mut cfg = Self::from_file(read_config_file(path)?);
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: LinkerConfigFile) -> Self {
        Self {
            log_file_path: file
                .log_file_path
                .unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_FILE_PATH)),
            iou_threshold: file.iou_threshold.unwrap_or(DEFAULT_IOU_THRESHOLD),
            vehicle_class_ids: file
                .vehicle_class_ids
                .map(|ids| ids.into_iter().collect())
                .unwrap_or_else(|| DEFAULT_VEHICLE_CLASS_IDS.into_iter().collect()),
            plate_component_id: file
                .plate_component_id
                .unwrap_or(DEFAULT_PLATE_COMPONENT_ID),
            brand_component_id: file
                .brand_component_id
                .unwrap_or(DEFAULT_BRAND_COMPONENT_ID),
            tie_break: file.tie_break.unwrap_or_default(),
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(path) = std::env::var("LINKER_LOG_FILE") {
            if !path.trim().is_empty() {
                self.log_file_path = PathBuf::from(path);
            }
        }
        if let Ok(threshold) = std::env::var("LINKER_IOU_THRESHOLD") {
            self.iou_threshold = threshold
                .trim()
                .parse()
                .map_err(|_| anyhow!("LINKER_IOU_THRESHOLD must be a number"))?;
        }
        if let Ok(ids) = std::env::var("LINKER_VEHICLE_CLASS_IDS") {
            let parsed = split_csv(&ids)
                .into_iter()
                .map(|id| {
                    id.parse::<i32>().map_err(|_| {
                        anyhow!("LINKER_VEHICLE_CLASS_IDS entry '{}' is not an integer", id)
                    })
                })
                .collect::<Result<BTreeSet<_>>>()?;
            if !parsed.is_empty() {
                self.vehicle_class_ids = parsed;
            }
        }
        if let Ok(id) = std::env::var("LINKER_PLATE_COMPONENT_ID") {
            self.plate_component_id = id
                .trim()
                .parse()
                .map_err(|_| anyhow!("LINKER_PLATE_COMPONENT_ID must be an integer"))?;
        }
        if let Ok(id) = std::env::var("LINKER_BRAND_COMPONENT_ID") {
            self.brand_component_id = id
                .trim()
                .parse()
                .map_err(|_| anyhow!("LINKER_BRAND_COMPONENT_ID must be an integer"))?;
        }
        if let Ok(mode) = std::env::var("LINKER_TIE_BREAK") {
            if !mode.trim().is_empty() {
                self.tie_break = mode.parse()?;
            }
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if !self.iou_threshold.is_finite() || !(0.0..=1.0).contains(&self.iou_threshold) {
            return Err(anyhow!(
                "iou_threshold must be within [0, 1], got {}",
                self.iou_threshold
            ));
        }
        if self.vehicle_class_ids.is_empty() {
            return Err(anyhow!("vehicle_class_ids must not be empty"));
        }
        if self.plate_component_id == self.brand_component_id {
            return Err(anyhow!(
                "plate_component_id and brand_component_id must differ (both {})",
                self.plate_component_id
            ));
        }
        if self.log_file_path.as_os_str().is_empty() {
            return Err(anyhow!("log_file_path must not be empty"));
        }
        Ok(())
    }

    pub fn classifier(&self) -> DetectionClassifier {
        DetectionClassifier::new(ClassifierPolicy {
            vehicle_class_ids: self.vehicle_class_ids.clone(),
            plate_component_id: self.plate_component_id,
            brand_component_id: self.brand_component_id,
        })
    }

    pub fn linker(&self) -> SpatialLinker {
        SpatialLinker::new(self.iou_threshold, self.tie_break)
    }

    pub fn sink(&self) -> ResultSink {
        ResultSink::new(self.log_file_path.clone())
    }
}

fn read_config_file(path: &Path) -> Result<LinkerConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let is_toml = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
    let cfg = if is_toml {
        toml::from_str(&raw).map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    } else {
        serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    };
    Ok(cfg)
}

fn split_csv(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|entry| entry.trim())
        .filter(|entry| !entry.is_empty())
        .map(|entry| entry.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_stock_pipeline() {
        let cfg = LinkerConfig::default();
        assert_eq!(cfg.log_file_path, PathBuf::from("detection_log.jsonl"));
        assert_eq!(cfg.iou_threshold, 0.1);
        assert_eq!(
            cfg.vehicle_class_ids.iter().copied().collect::<Vec<_>>(),
            vec![2, 3, 5, 7]
        );
        assert_eq!(cfg.plate_component_id, 2);
        assert_eq!(cfg.brand_component_id, 3);
        assert_eq!(cfg.tie_break, TieBreak::LastWins);
        cfg.validate().unwrap();
    }

    #[test]
    fn validation_rejects_bad_values() {
        let mut cfg = LinkerConfig::default();
        cfg.iou_threshold = 1.5;
        assert!(cfg.validate().is_err());
        cfg.iou_threshold = f32::NAN;
        assert!(cfg.validate().is_err());

        let mut cfg = LinkerConfig::default();
        cfg.vehicle_class_ids.clear();
        assert!(cfg.validate().is_err());

        let mut cfg = LinkerConfig::default();
        cfg.brand_component_id = cfg.plate_component_id;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn split_csv_drops_blanks() {
        assert_eq!(split_csv(" 2, 3,,7 "), vec!["2", "3", "7"]);
    }
}
