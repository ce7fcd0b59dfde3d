use chrono::Utc;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use validator::Validate;

use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::models::{round1, AlertPriority, QualityMetric};
use crate::repositories::{require, Repository};
use crate::services::alerts::{AlertService, NewAlert};

pub const QUALITY_ALERT_SOURCE: &str = "Quality Control";

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct NewQualityMetric {
    pub line_id: i64,
    #[validate(range(min = 0.0, max = 100.0))]
    pub defect_rate: f64,
    #[serde(default)]
    pub inspected_units: u32,
}

#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct QualityMetricUpdate {
    #[validate(range(min = 0.0, max = 100.0))]
    pub defect_rate: Option<f64>,
    pub inspected_units: Option<u32>,
}

pub struct QualityService {
    repo: Arc<dyn Repository<QualityMetric>>,
    alerts: Arc<AlertService>,
    events: EventSender,
    defect_alert_threshold: f64,
    write_lock: Mutex<()>,
}

impl QualityService {
    pub fn new(
        repo: Arc<dyn Repository<QualityMetric>>,
        alerts: Arc<AlertService>,
        events: EventSender,
        defect_alert_threshold: f64,
    ) -> Self {
        Self {
            repo,
            alerts,
            events,
            defect_alert_threshold,
            write_lock: Mutex::new(()),
        }
    }

    /// Metrics newest first, optionally for one line.
    pub async fn list(&self, line_id: Option<i64>) -> Result<Vec<QualityMetric>, ServiceError> {
        let mut metrics: Vec<QualityMetric> = self
            .repo
            .list()
            .await?
            .into_iter()
            .filter(|m| line_id.map_or(true, |line| m.line_id == line))
            .collect();
        metrics.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then(b.id.cmp(&a.id)));
        Ok(metrics)
    }

    pub async fn by_line(&self, line_id: i64) -> Result<Vec<QualityMetric>, ServiceError> {
        self.list(Some(line_id)).await
    }

    pub async fn get(&self, id: i64) -> Result<QualityMetric, ServiceError> {
        require(self.repo.as_ref(), "Quality metric", id).await
    }

    /// Records an inspection. A defect rate above the alert threshold raises
    /// a High alert; failing to raise it does not undo the metric.
    #[instrument(skip(self))]
    pub async fn create(&self, input: NewQualityMetric) -> Result<QualityMetric, ServiceError> {
        input.validate()?;
        let metric = self
            .repo
            .insert(QualityMetric {
                id: 0,
                line_id: input.line_id,
                defect_rate: input.defect_rate,
                inspected_units: input.inspected_units,
                timestamp: Utc::now(),
            })
            .await?;
        info!(metric_id = metric.id, line_id = metric.line_id, defect_rate = metric.defect_rate, "Quality metric recorded");
        self.events.emit(Event::QualityMetricRecorded {
            line_id: metric.line_id,
            defect_rate: metric.defect_rate,
        });

        if metric.defect_rate > self.defect_alert_threshold {
            let raised = self
                .alerts
                .create(NewAlert {
                    priority: AlertPriority::High,
                    source: QUALITY_ALERT_SOURCE.to_string(),
                    message: format!(
                        "Line {} defect rate {}% exceeds {}%",
                        metric.line_id, metric.defect_rate, self.defect_alert_threshold
                    ),
                })
                .await;
            if let Err(e) = raised {
                warn!(metric_id = metric.id, error = %e, "Failed to raise quality alert");
            }
        }
        Ok(metric)
    }

    #[instrument(skip(self))]
    pub async fn update(
        &self,
        id: i64,
        input: QualityMetricUpdate,
    ) -> Result<QualityMetric, ServiceError> {
        input.validate()?;
        let _guard = self.write_lock.lock().await;
        let mut metric = self.get(id).await?;
        if let Some(rate) = input.defect_rate {
            metric.defect_rate = rate;
        }
        if let Some(units) = input.inspected_units {
            metric.inspected_units = units;
        }
        self.repo.update(metric).await
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, id: i64) -> Result<(), ServiceError> {
        if self.repo.delete(id).await? {
            Ok(())
        } else {
            Err(ServiceError::not_found("Quality metric", id))
        }
    }

    pub async fn average_defect_rate(&self, line_id: Option<i64>) -> Result<f64, ServiceError> {
        Ok(Self::mean_defect_rate(&self.list(line_id).await?))
    }

    pub fn mean_defect_rate(metrics: &[QualityMetric]) -> f64 {
        if metrics.is_empty() {
            return 0.0;
        }
        round1(metrics.iter().map(|m| m.defect_rate).sum::<f64>() / metrics.len() as f64)
    }

    /// Mean defect rate keyed by line id.
    pub fn defect_rate_by_line(metrics: &[QualityMetric]) -> BTreeMap<i64, f64> {
        let mut grouped: BTreeMap<i64, Vec<QualityMetric>> = BTreeMap::new();
        for metric in metrics {
            grouped.entry(metric.line_id).or_default().push(metric.clone());
        }
        grouped
            .into_iter()
            .map(|(line, metrics)| (line, Self::mean_defect_rate(&metrics)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repositories::MemoryRepository;

    fn services() -> (QualityService, Arc<AlertService>) {
        let alerts = Arc::new(AlertService::new(
            Arc::new(MemoryRepository::new()),
            EventSender::detached(),
        ));
        let quality = QualityService::new(
            Arc::new(MemoryRepository::new()),
            alerts.clone(),
            EventSender::detached(),
            5.0,
        );
        (quality, alerts)
    }

    fn metric(line_id: i64, defect_rate: f64) -> NewQualityMetric {
        NewQualityMetric {
            line_id,
            defect_rate,
            inspected_units: 500,
        }
    }

    #[tokio::test]
    async fn defect_rate_above_threshold_raises_high_alert() {
        let (quality, alerts) = services();
        quality.create(metric(2, 7.5)).await.unwrap();

        let raised = alerts.list().await.unwrap();
        assert_eq!(raised.len(), 1);
        assert_eq!(raised[0].priority, AlertPriority::High);
        assert_eq!(raised[0].source, QUALITY_ALERT_SOURCE);
    }

    #[tokio::test]
    async fn rate_at_threshold_raises_nothing() {
        let (quality, alerts) = services();
        quality.create(metric(2, 5.0)).await.unwrap();
        assert!(alerts.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn averages_per_line() {
        let (quality, _) = services();
        quality.create(metric(1, 1.0)).await.unwrap();
        quality.create(metric(1, 2.0)).await.unwrap();
        quality.create(metric(2, 4.0)).await.unwrap();

        assert_eq!(quality.average_defect_rate(Some(1)).await.unwrap(), 1.5);
        assert_eq!(quality.average_defect_rate(None).await.unwrap(), 2.3);

        let by_line = QualityService::defect_rate_by_line(&quality.list(None).await.unwrap());
        assert_eq!(by_line.get(&2), Some(&4.0));
    }
}
