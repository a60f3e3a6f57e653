//! Incremental content loading: reveal more items until a target count is
//! visible or the page stops growing.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::driver::BrowserDriver;

use super::scripts;
use super::types::StepFailure;

/// The item count could not be read. Never fatal to a load.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("item count unavailable: {0}")]
pub struct CountUnavailable(pub String);

/// Something whose content grows when asked to reveal more.
#[async_trait]
pub trait ContentSurface: Send + Sync {
    async fn item_count(&self) -> Result<u32, CountUnavailable>;

    /// Triggers loading of more content (e.g. scrolling to the bottom).
    async fn reveal_more(&self) -> Result<(), StepFailure>;

    /// A measure that increases whenever new content is rendered.
    async fn extent(&self) -> Result<u64, StepFailure>;
}

/// Why loading stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadStop {
    TargetReached,
    Stagnated,
    Exhausted,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoadResult {
    /// Last observed item count; `None` if it was never readable.
    pub count: Option<u32>,
    /// Number of reveal actions performed.
    pub iterations: u32,
    pub stop: LoadStop,
}

#[derive(Debug, Clone, Copy)]
pub struct ContentLoader {
    pub max_iterations: u32,
    pub pause: Duration,
}

impl ContentLoader {
    pub fn new(max_iterations: u32, pause: Duration) -> Self {
        Self {
            max_iterations,
            pause,
        }
    }

    pub async fn load_until<S>(&self, surface: &S, target: u32) -> Result<LoadResult, StepFailure>
    where
        S: ContentSurface + ?Sized,
    {
        let initial = read_count(surface).await;
        if let Some(count) = initial {
            if count >= target {
                debug!(count, target, "target already visible, no reveal needed");
                return Ok(LoadResult {
                    count: Some(count),
                    iterations: 0,
                    stop: LoadStop::TargetReached,
                });
            }
        }

        let mut latest = initial;
        let mut last_extent = 0;
        let mut iterations = 0;

        while iterations < self.max_iterations {
            surface.reveal_more().await?;
            iterations += 1;
            tokio::time::sleep(self.pause).await;

            let extent = surface.extent().await?;
            let count = read_count(surface).await;
            if count.is_some() {
                latest = count;
            }
            debug!(iteration = iterations, extent, count = ?count, "revealed more content");

            if let Some(count) = count {
                if count >= target {
                    return Ok(LoadResult {
                        count: latest,
                        iterations,
                        stop: LoadStop::TargetReached,
                    });
                }
            }

            if extent == last_extent {
                debug!(extent, "extent stopped growing");
                return Ok(LoadResult {
                    count: latest,
                    iterations,
                    stop: LoadStop::Stagnated,
                });
            }
            last_extent = extent;
        }

        debug!(max_iterations = self.max_iterations, "reveal limit reached");
        Ok(LoadResult {
            count: latest,
            iterations,
            stop: LoadStop::Exhausted,
        })
    }
}

async fn read_count<S: ContentSurface + ?Sized>(surface: &S) -> Option<u32> {
    match surface.item_count().await {
        Ok(count) => Some(count),
        Err(e) => {
            debug!(error = %e, "count not readable");
            None
        }
    }
}

/// Parses the total from "<selected> / <total>".
pub fn parse_selection_count(text: &str) -> Result<u32, CountUnavailable> {
    let parts: Vec<&str> = text.split('/').collect();
    match parts.as_slice() {
        [_, total] => total
            .trim()
            .parse()
            .map_err(|_| CountUnavailable(format!("not a number: {:?}", total.trim()))),
        _ => Err(CountUnavailable(format!("unexpected selection text {:?}", text))),
    }
}

/// [`ContentSurface`] backed by a live page.
pub struct DriverSurface<'a> {
    driver: &'a dyn BrowserDriver,
}

impl<'a> DriverSurface<'a> {
    pub fn new(driver: &'a dyn BrowserDriver) -> Self {
        Self { driver }
    }
}

#[async_trait]
impl ContentSurface for DriverSurface<'_> {
    async fn item_count(&self) -> Result<u32, CountUnavailable> {
        let value = self
            .driver
            .execute(scripts::SELECTION_TEXT, Vec::new())
            .await
            .map_err(|e| CountUnavailable(e.to_string()))?;
        match value {
            Value::String(text) if !text.trim().is_empty() => parse_selection_count(&text),
            _ => Err(CountUnavailable("selection indicator not present".to_string())),
        }
    }

    async fn reveal_more(&self) -> Result<(), StepFailure> {
        self.driver
            .execute(scripts::SCROLL_TO_BOTTOM, Vec::new())
            .await?;
        Ok(())
    }

    async fn extent(&self) -> Result<u64, StepFailure> {
        let value = self.driver.execute(scripts::SCROLL_HEIGHT, Vec::new()).await?;
        value
            .as_u64()
            .or_else(|| value.as_f64().map(|h| h as u64))
            .ok_or_else(|| StepFailure::unparseable(format!("scroll height is not a number: {}", value)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Surface driven by per-reveal scripts of extents and counts.
    struct ScriptedSurface {
        initial: Option<u32>,
        extents: Vec<u64>,
        counts: Vec<Option<u32>>,
        reveals: Mutex<usize>,
    }

    impl ScriptedSurface {
        fn new(initial: Option<u32>, extents: Vec<u64>, counts: Vec<Option<u32>>) -> Self {
            Self {
                initial,
                extents,
                counts,
                reveals: Mutex::new(0),
            }
        }

        fn reveals(&self) -> usize {
            *self.reveals.lock().unwrap()
        }

        fn at<T: Copy>(values: &[T], idx: usize) -> T {
            values[idx.min(values.len() - 1)]
        }
    }

    #[async_trait]
    impl ContentSurface for ScriptedSurface {
        async fn item_count(&self) -> Result<u32, CountUnavailable> {
            let reveals = self.reveals();
            let count = if reveals == 0 {
                self.initial
            } else {
                Self::at(&self.counts, reveals - 1)
            };
            count.ok_or_else(|| CountUnavailable("hidden".into()))
        }

        async fn reveal_more(&self) -> Result<(), StepFailure> {
            *self.reveals.lock().unwrap() += 1;
            Ok(())
        }

        async fn extent(&self) -> Result<u64, StepFailure> {
            Ok(Self::at(&self.extents, self.reveals() - 1))
        }
    }

    fn loader() -> ContentLoader {
        ContentLoader::new(20, Duration::from_secs(5))
    }

    #[tokio::test(start_paused = true)]
    async fn test_target_already_met_does_no_work() {
        let surface = ScriptedSurface::new(Some(60), vec![1000], vec![Some(60)]);
        let result = loader().load_until(&surface, 50).await.unwrap();

        assert_eq!(result.count, Some(60));
        assert_eq!(result.iterations, 0);
        assert_eq!(result.stop, LoadStop::TargetReached);
        assert_eq!(surface.reveals(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stops_when_extent_stagnates() {
        let surface = ScriptedSurface::new(
            Some(10),
            vec![1000, 2000, 3000, 4000, 4000],
            vec![Some(20), Some(30), Some(40), Some(45), Some(45)],
        );
        let result = loader().load_until(&surface, 100).await.unwrap();

        assert_eq!(result.iterations, 5);
        assert_eq!(result.stop, LoadStop::Stagnated);
        assert_eq!(result.count, Some(45));
        assert_eq!(surface.reveals(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_runs_exactly_max_iterations() {
        let extents: Vec<u64> = (1..=30).map(|i| i * 1000).collect();
        let counts: Vec<Option<u32>> = (1..=30).map(|i| Some(i * 2)).collect();
        let surface = ScriptedSurface::new(Some(1), extents, counts);

        let result = loader().load_until(&surface, 1000).await.unwrap();

        assert_eq!(result.iterations, 20);
        assert_eq!(result.stop, LoadStop::Exhausted);
        assert_eq!(result.count, Some(40));
        assert_eq!(surface.reveals(), 20);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stops_when_target_reached() {
        let surface = ScriptedSurface::new(
            None,
            vec![1000, 2000, 3000],
            vec![Some(30), Some(80), Some(120)],
        );
        let result = loader().load_until(&surface, 100).await.unwrap();
        assert_eq!(result.iterations, 3);
        assert_eq!(result.count, Some(120));
        assert_eq!(result.stop, LoadStop::TargetReached);
    }

    #[tokio::test(start_paused = true)]
    async fn test_keeps_last_known_count() {
        let surface = ScriptedSurface::new(
            None,
            vec![1000, 2000, 2000],
            vec![Some(25), None, None],
        );
        let result = loader().load_until(&surface, 100).await.unwrap();
        assert_eq!(result.count, Some(25));
        assert_eq!(result.stop, LoadStop::Stagnated);
    }

    #[tokio::test(start_paused = true)]
    async fn test_count_never_observed_is_none() {
        let surface = ScriptedSurface::new(None, vec![0], vec![None]);
        let result = loader().load_until(&surface, 100).await.unwrap();
        assert_eq!(result.count, None);
        assert_eq!(result.iterations, 1);
        assert_eq!(result.stop, LoadStop::Stagnated);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pauses_between_reveals() {
        let surface = ScriptedSurface::new(Some(0), vec![100, 100], vec![Some(0)]);
        let start = tokio::time::Instant::now();
        loader().load_until(&surface, 10).await.unwrap();
        assert_eq!(start.elapsed(), Duration::from_secs(10));
    }

    #[test]
    fn test_parse_selection_count() {
        assert_eq!(parse_selection_count("12 / 150"), Ok(150));
        assert_eq!(parse_selection_count("0/7"), Ok(7));
        assert!(parse_selection_count("150").is_err());
        assert!(parse_selection_count("1 / 2 / 3").is_err());
        assert!(parse_selection_count("a / b").is_err());
    }
}
