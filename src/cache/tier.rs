//! Discrete image resolutions cached per URL.

use std::collections::HashMap;

/// Size tier of a cached image, smallest first
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SizeTier {
    /// 1-pixel placeholder delivered by the base fetch
    Icon,
    Xs,
    S,
    M,
    L,
}

impl SizeTier {
    pub const COUNT: usize = 5;
    pub const ALL: [SizeTier; Self::COUNT] = [Self::Icon, Self::Xs, Self::S, Self::M, Self::L];

    /// Target edge length in pixels
    pub fn pixels(self) -> u32 {
        match self {
            Self::Icon => 1,
            Self::Xs => 48,
            Self::S => 96,
            Self::M => 156,
            Self::L => 300,
        }
    }

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Icon => "i",
            Self::Xs => "xs",
            Self::S => "s",
            Self::M => "m",
            Self::L => "l",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.name() == name)
    }

    /// Smallest tier covering `requested` pixels; the largest tier when
    /// nothing covers it.
    pub fn for_requested_scale(requested: f64) -> Self {
        Self::ALL
            .into_iter()
            .find(|t| requested <= t.pixels() as f64)
            .unwrap_or(Self::L)
    }
}

/// Builds tier-specific fetch URLs from an image's source id.
#[derive(Debug, Clone)]
pub struct TierUrlTemplate {
    template: String,
    blur: HashMap<SizeTier, u32>,
}

impl TierUrlTemplate {
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
            blur: HashMap::new(),
        }
    }

    pub fn with_blur(mut self, tier: SizeTier, radius: u32) -> Self {
        self.blur.insert(tier, radius);
        self
    }

    pub fn url(&self, source_id: &str, tier: SizeTier) -> String {
        let mut url = self
            .template
            .replace("{id}", source_id)
            .replace("{size}", &tier.pixels().to_string());
        if let Some(radius) = self.blur.get(&tier) {
            url.push_str(if url.contains('?') { "&" } else { "?" });
            url.push_str(&format!("blur={radius}"));
        }
        url
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_selection() {
        assert_eq!(SizeTier::for_requested_scale(0.5), SizeTier::Icon);
        assert_eq!(SizeTier::for_requested_scale(1.0), SizeTier::Icon);
        assert_eq!(SizeTier::for_requested_scale(30.0), SizeTier::Xs);
        assert_eq!(SizeTier::for_requested_scale(96.0), SizeTier::S);
        assert_eq!(SizeTier::for_requested_scale(97.0), SizeTier::M);
        assert_eq!(SizeTier::for_requested_scale(300.0), SizeTier::L);
        assert_eq!(SizeTier::for_requested_scale(1_000.0), SizeTier::L);
    }

    #[test]
    fn test_tier_url() {
        let template = TierUrlTemplate::new("https://picsum.photos/id/{id}/{size}")
            .with_blur(SizeTier::Xs, 1);
        assert_eq!(
            template.url("420", SizeTier::Xs),
            "https://picsum.photos/id/420/48?blur=1"
        );
        assert_eq!(
            template.url("420", SizeTier::L),
            "https://picsum.photos/id/420/300"
        );
    }

    #[test]
    fn test_names_round_trip() {
        for tier in SizeTier::ALL {
            assert_eq!(SizeTier::from_name(tier.name()), Some(tier));
        }
        assert_eq!(SizeTier::from_name("xl"), None);
    }
}
