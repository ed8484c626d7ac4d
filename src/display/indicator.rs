//! Display indicator implementations

use crate::config::IndicatorConfig;
use std::sync::mpsc;
use tracing::{debug, info, warn};

/// One of the two fixed indicator images
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndicatorImage {
    /// LED lit
    On,
    /// LED dark
    Off,
}

impl IndicatorImage {
    /// Image for a toggle state
    pub fn for_state(lit: bool) -> Self {
        if lit { Self::On } else { Self::Off }
    }

    /// Configured resource name of this image
    pub fn resource_name(self, config: &IndicatorConfig) -> &str {
        match self {
            Self::On => &config.on_image,
            Self::Off => &config.off_image,
        }
    }
}

/// Presentational proxy for the toggle state
///
/// Write-only and infallible from the controller's point of view. Called on
/// the edge callback thread, so implementations must not block.
pub trait DisplayIndicator: Send + Sync {
    /// Show the "on" image
    fn show_on(&self);

    /// Show the "off" image
    fn show_off(&self);

    /// Show the image for `image`
    fn show(&self, image: IndicatorImage) {
        match image {
            IndicatorImage::On => self.show_on(),
            IndicatorImage::Off => self.show_off(),
        }
    }
}

/// Sends every frame to a UI thread
///
/// Never blocks: when the channel is full the frame is dropped with a
/// warning, and a disconnected receiver is logged and otherwise ignored.
pub struct ChannelIndicator {
    sender: mpsc::SyncSender<IndicatorImage>,
}

impl ChannelIndicator {
    /// Create an indicator and the receiver the UI thread renders from
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<IndicatorImage>) {
        let (sender, receiver) = mpsc::sync_channel(capacity);
        (Self { sender }, receiver)
    }

    fn send(&self, image: IndicatorImage) {
        match self.sender.try_send(image) {
            Ok(()) => debug!("Display frame sent: {image:?}"),
            Err(mpsc::TrySendError::Full(_)) => {
                warn!("Display is not keeping up, dropping {image:?} frame");
            }
            Err(mpsc::TrySendError::Disconnected(_)) => {
                warn!("Failed to send {image:?} frame to display: receiver closed");
            }
        }
    }
}

impl DisplayIndicator for ChannelIndicator {
    fn show_on(&self) {
        self.send(IndicatorImage::On);
    }

    fn show_off(&self) {
        self.send(IndicatorImage::Off);
    }
}

/// Logs frames instead of drawing them
pub struct LogIndicator {
    config: IndicatorConfig,
}

impl LogIndicator {
    /// Create an indicator that logs the configured image names
    pub fn new(config: IndicatorConfig) -> Self {
        Self { config }
    }
}

impl DisplayIndicator for LogIndicator {
    fn show_on(&self) {
        info!("Indicator: {}", IndicatorImage::On.resource_name(&self.config));
    }

    fn show_off(&self) {
        info!("Indicator: {}", IndicatorImage::Off.resource_name(&self.config));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::count_events;
    use tracing::Level;

    #[test]
    fn test_image_for_state() {
        assert_eq!(IndicatorImage::for_state(true), IndicatorImage::On);
        assert_eq!(IndicatorImage::for_state(false), IndicatorImage::Off);
    }

    #[test]
    fn test_resource_names_follow_config() {
        let config = IndicatorConfig {
            on_image: "lamp_lit".to_string(),
            off_image: "lamp_dark".to_string(),
            ..IndicatorConfig::default()
        };
        assert_eq!(IndicatorImage::On.resource_name(&config), "lamp_lit");
        assert_eq!(IndicatorImage::Off.resource_name(&config), "lamp_dark");
    }

    #[test]
    fn test_channel_indicator_forwards_frames_in_order() {
        let (indicator, frames) = ChannelIndicator::new(8);
        indicator.show_on();
        indicator.show(IndicatorImage::Off);
        indicator.show_on();

        let received: Vec<_> = frames.try_iter().collect();
        assert_eq!(
            received,
            vec![IndicatorImage::On, IndicatorImage::Off, IndicatorImage::On]
        );
    }

    #[test]
    fn test_channel_indicator_survives_closed_receiver() {
        let (indicator, frames) = ChannelIndicator::new(1);
        drop(frames);
        // Must not panic
        indicator.show_on();
        indicator.show_off();
    }

    #[test]
    fn test_channel_indicator_drops_frames_when_full() {
        let (indicator, frames) = ChannelIndicator::new(1);

        let warnings = count_events(Level::WARN, || {
            indicator.show_on();
            // Receiver alive but not draining: must return, not block
            indicator.show_off();
            indicator.show_off();
        });

        assert_eq!(warnings, 2);
        assert_eq!(frames.try_iter().collect::<Vec<_>>(), vec![IndicatorImage::On]);
    }

    #[test]
    fn test_log_indicator_logs_configured_names() {
        let indicator = LogIndicator::new(IndicatorConfig::default());

        let infos = count_events(Level::INFO, || {
            indicator.show(IndicatorImage::On);
            indicator.show_off();
        });

        assert_eq!(infos, 2);
    }
}
