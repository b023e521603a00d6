// Chart presenter - Binds aggregated values and labels into a display model
use crate::domain::chart::{AxisLabelSet, ChartDisplayModel, DataSeries, MetricSeries};
use crate::domain::metric::MetricKind;

const FALLBACK_TITLE: &str = "Data";

pub fn present(
    series: &MetricSeries,
    axis_markers: AxisLabelSet,
    date_label: String,
    last_updated: Option<String>,
) -> ChartDisplayModel {
    let metric = MetricKind::from_identifier(&series.identifier);
    let title = metric
        .map(|m| m.display_name().to_string())
        .unwrap_or_else(|| FALLBACK_TITLE.to_string());

    let mut model = ChartDisplayModel {
        identifier: series.identifier.clone(),
        title,
        subtitle: date_label,
        axis_markers,
        series: Vec::new(),
        last_updated,
    };

    // Header and axis still render without a unit
    let Some(unit) = metric.map(|m| m.preferred_unit()) else {
        tracing::debug!("No unit for {}, leaving data series empty", series.identifier);
        return model;
    };

    model.series.push(DataSeries {
        values: series.values.clone(),
        legend: unit.description().to_string(),
    });
    model
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels() -> AxisLabelSet {
        vec!["Wed".to_string(), "Thu".to_string()]
    }

    #[test]
    fn test_present_known_metric() {
        let series = MetricSeries::new(MetricKind::StepCount.identifier(), vec![1200.0, 800.0]);
        let model = present(
            &series,
            labels(),
            "Jun 3–10, 2020".to_string(),
            Some("last updated on Jun 10, 2020".to_string()),
        );

        assert_eq!(model.title, "Step Count");
        assert_eq!(model.subtitle, "Jun 3–10, 2020");
        assert_eq!(model.last_updated.as_deref(), Some("last updated on Jun 10, 2020"));
        assert_eq!(model.axis_markers, labels());
        assert_eq!(
            model.series,
            vec![DataSeries {
                values: vec![1200.0, 800.0],
                legend: "steps".to_string()
            }]
        );
    }

    #[test]
    fn test_unknown_metric_is_partial_render() {
        let series = MetricSeries::new("HKQuantityTypeIdentifierHeartRate", vec![60.0]);
        let model = present(&series, labels(), "Jun 10, 2020".to_string(), None);

        assert_eq!(model.title, "Data");
        assert_eq!(model.subtitle, "Jun 10, 2020");
        assert_eq!(model.axis_markers, labels());
        assert!(model.series.is_empty());
        assert_eq!(model.last_updated, None);
    }
}
