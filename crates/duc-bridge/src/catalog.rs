//! Point catalog
//!
//! Built once at startup from `pdb.browse`: every point is either
//! classified or dropped, never both.

use std::collections::HashMap;

use duc_client::{BrowseResult, DucClient, Point};
use tracing::{debug, info, warn, Span};

use crate::classification::SensorClassification;
use crate::error::BridgeResult;

/// Classified points of one controller, keyed by pid
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Catalog {
    device_id: String,
    entries: HashMap<String, SensorClassification>,
}

impl Catalog {
    /// Browse `client` and classify every point not under a disallowed prefix
    pub async fn build(client: &mut DucClient, disallowed_prefixes: &[String]) -> BridgeResult<Self> {
        CatalogBuilder::new(disallowed_prefixes.iter().cloned())
            .with_span(client.span().clone())
            .build(client)
            .await
    }

    /// Controller device id reported by the browse
    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    pub fn get(&self, pid: &str) -> Option<&SensorClassification> {
        self.entries.get(pid)
    }

    /// Every catalogued pid, in no particular order
    pub fn pids(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &SensorClassification)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Bus-safe name for a pid (the hierarchy dots become underscores)
    pub fn topic_name(pid: &str) -> String {
        pid.replace('.', "_")
    }
}

/// Classifies browse results into a [`Catalog`]
#[derive(Debug, Clone)]
pub struct CatalogBuilder {
    disallowed_prefixes: Vec<String>,
    span: Span,
}

impl CatalogBuilder {
    pub fn new<I, S>(disallowed_prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            disallowed_prefixes: disallowed_prefixes.into_iter().map(Into::into).collect(),
            span: Span::current(),
        }
    }

    /// Record all events under `span`
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// Fetch the point list with one `pdb.browse` and classify it
    pub async fn build(&self, client: &mut DucClient) -> BridgeResult<Catalog> {
        let browse = client.browse().await?;
        Ok(self.classify(browse))
    }

    /// Classify an already fetched point list
    pub fn classify(&self, browse: BrowseResult) -> Catalog {
        let mut entries = HashMap::new();

        for point in &browse.points {
            if let Some(classification) = self.classify_point(point) {
                info!(
                    parent: &self.span,
                    pid = %point.pid,
                    topic = %Catalog::topic_name(&point.pid),
                    kind = classification.category().as_str(),
                    "Found sensor: {}",
                    point.desc
                );
                entries.insert(point.pid.clone(), classification);
            }
        }

        debug!(
            parent: &self.span,
            device = %browse.devid,
            browsed = browse.points.len(),
            catalogued = entries.len(),
            "Catalog built"
        );

        Catalog {
            device_id: browse.devid,
            entries,
        }
    }

    fn is_disallowed(&self, pid: &str) -> bool {
        self.disallowed_prefixes
            .iter()
            .any(|prefix| pid.starts_with(prefix.as_str()))
    }

    fn classify_point(&self, point: &Point) -> Option<SensorClassification> {
        if self.is_disallowed(&point.pid) {
            debug!(parent: &self.span, pid = %point.pid, "Skipping sensor: {}", point.desc);
            return None;
        }

        match point.point_type.as_str() {
            "enum" => Some(SensorClassification::alarm(&point.desc)),
            "number" => {
                let unit = point.attr.as_deref().unwrap_or_default();
                let classification = SensorClassification::measurement(&point.desc, unit);
                if classification.is_none() {
                    warn!(
                        parent: &self.span,
                        pid = %point.pid,
                        "Unknown device class for sensor {}: {}",
                        point.pid,
                        unit
                    );
                }
                classification
            }
            other => {
                warn!(
                    parent: &self.span,
                    pid = %point.pid,
                    point_type = %other,
                    "Unknown point type for sensor {}: {}",
                    point.pid,
                    point.desc
                );
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classification::{Accumulation, Quantity};
    use pretty_assertions::assert_eq;
    use tracing_test::traced_test;

    fn point(pid: &str, desc: &str, point_type: &str, attr: Option<&str>) -> Point {
        Point {
            pid: pid.to_string(),
            desc: desc.to_string(),
            acc: "r".to_string(),
            point_type: point_type.to_string(),
            attr: attr.map(String::from),
        }
    }

    fn browse(points: Vec<Point>) -> BrowseResult {
        BrowseResult {
            devid: "DUC-1".to_string(),
            points,
        }
    }

    #[test]
    fn test_alarm_and_energy() {
        let catalog = CatalogBuilder::new(Vec::<String>::new()).classify(browse(vec![
            point("A1", "High Temp Alarm", "enum", None),
            point("E1", "Main Meter", "number", Some("kWh")),
        ]));

        assert_eq!(catalog.device_id(), "DUC-1");
        assert_eq!(catalog.len(), 2);
        assert_eq!(
            catalog.get("A1"),
            Some(&SensorClassification::alarm("High Temp Alarm"))
        );
        assert_eq!(
            catalog.get("E1"),
            Some(&SensorClassification::Measurement {
                name: "Main Meter".to_string(),
                quantity: Quantity::Energy,
                accumulation: Accumulation::CumulativeTotal,
                unit: "kWh".to_string(),
            })
        );
    }

    #[test]
    fn test_voltage_is_instantaneous() {
        let catalog = CatalogBuilder::new(Vec::<String>::new())
            .classify(browse(vec![point("V1", "Phase L1", "number", Some("V"))]));

        match catalog.get("V1") {
            Some(SensorClassification::Measurement {
                quantity,
                accumulation,
                ..
            }) => {
                assert_eq!(*quantity, Quantity::Voltage);
                assert_eq!(*accumulation, Accumulation::Instantaneous);
            }
            other => panic!("unexpected classification: {:?}", other),
        }
    }

    #[test]
    fn test_disallowed_prefixes() {
        let catalog = CatalogBuilder::new(["sys."]).classify(browse(vec![
            point("sys.uptime", "Uptime", "number", Some("W")),
            point("sys.alarm", "Watchdog", "enum", None),
            point("plant.sys.meter", "Meter", "number", Some("W")),
            point("A1", "Alarm", "enum", None),
        ]));

        let mut pids = catalog.pids();
        pids.sort();
        assert_eq!(pids, vec!["A1".to_string(), "plant.sys.meter".to_string()]);
    }

    #[test]
    fn test_multiple_prefixes() {
        let catalog = CatalogBuilder::new(["sys.", "hw."]).classify(browse(vec![
            point("sys.a", "a", "enum", None),
            point("hw.b", "b", "enum", None),
            point("c", "c", "enum", None),
        ]));
        assert_eq!(catalog.pids(), vec!["c".to_string()]);
    }

    #[test]
    #[traced_test]
    fn test_unmapped_unit_is_dropped_with_warning() {
        let catalog = CatalogBuilder::new(Vec::<String>::new()).classify(browse(vec![
            point("F1", "Grid Frequency", "number", Some("Hz")),
            point("W1", "Load", "number", Some("W")),
        ]));

        assert_eq!(catalog.get("F1"), None);
        assert!(catalog.get("W1").is_some());
        assert!(logs_contain("Unknown device class for sensor F1: Hz"));
    }

    #[test]
    #[traced_test]
    fn test_number_without_unit_is_dropped() {
        let catalog = CatalogBuilder::new(Vec::<String>::new())
            .classify(browse(vec![point("N1", "Counter", "number", None)]));
        assert!(catalog.is_empty());
        assert!(logs_contain("Unknown device class for sensor N1"));
    }

    #[test]
    #[traced_test]
    fn test_unknown_type_is_dropped_with_warning() {
        let catalog = CatalogBuilder::new(Vec::<String>::new())
            .classify(browse(vec![point("S1", "Setpoint", "string", None)]));
        assert!(catalog.is_empty());
        assert!(logs_contain("Unknown point type for sensor S1"));
    }

    #[test]
    #[traced_test]
    fn test_disallowed_point_logged_at_debug_only() {
        CatalogBuilder::new(["sys."])
            .classify(browse(vec![point("sys.x", "Hidden", "bogus", None)]));
        assert!(logs_contain("Skipping sensor: Hidden"));
        // Prefix filtering wins over type checks
        assert!(!logs_contain("Unknown point type"));
    }

    #[test]
    fn test_empty_browse() {
        let catalog = CatalogBuilder::new(["sys."]).classify(BrowseResult::default());
        assert!(catalog.is_empty());
        assert_eq!(catalog.device_id(), "");
    }

    #[test]
    fn test_topic_name() {
        assert_eq!(Catalog::topic_name("plant.meter.e1"), "plant_meter_e1");
        assert_eq!(Catalog::topic_name("A1"), "A1");
    }
}
