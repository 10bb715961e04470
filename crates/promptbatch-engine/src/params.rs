use promptbatch_common::error::{PromptbatchError, Result};
use serde::{Deserialize, Serialize};

pub const MAX_OUTPUTS_PER_JOB: u8 = 10;

pub const VALID_DIMENSIONS: [u32; 17] = [
    512, 576, 640, 704, 768, 832, 896, 960, 1024, 1152, 1280, 1472, 1536, 1664, 1792, 1920, 2048,
];

pub const VALID_CONTRASTS: [f32; 8] = [1.0, 1.3, 1.8, 2.5, 3.0, 3.5, 4.0, 4.5];

/// Contrast floor when alchemy is enabled.
pub const ALCHEMY_MIN_CONTRAST: f32 = 2.5;

pub const PHOENIX_STYLES: [&str; 25] = [
    "3D Render",
    "Bokeh",
    "Cinematic",
    "Cinematic Concept",
    "Creative",
    "Dynamic",
    "Fashion",
    "Graphic Design Pop Art",
    "Graphic Design Vector",
    "HDR",
    "Illustration",
    "Macro",
    "Minimalist",
    "Moody",
    "None",
    "Portrait",
    "Pro B&W photography",
    "Pro color photography",
    "Pro film photography",
    "Portrait Fashion",
    "Ray Traced",
    "Sketch (B&W)",
    "Sketch (Color)",
    "Stock Photo",
    "Vibrant",
];

pub const FLUX_STYLES: [&str; 15] = [
    "3D Render",
    "Acrylic",
    "Anime General",
    "Creative",
    "Dynamic",
    "Fashion",
    "Game Concept",
    "Graphic Design 3D",
    "Illustration",
    "None",
    "Portrait",
    "Portrait Cinematic",
    "Ray Traced",
    "Stock Photo",
    "Watercolor",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "model", rename_all = "lowercase")]
pub enum GenerationParams {
    Phoenix(PhoenixParams),
    Flux(FluxParams),
    PhotoReal(PhotoRealParams),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageOptions {
    #[serde(default = "default_num_outputs", alias = "num_images")]
    pub num_outputs: u8,
    #[serde(default = "default_dimension")]
    pub width: u32,
    #[serde(default = "default_dimension")]
    pub height: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub negative_prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,
}

impl Default for ImageOptions {
    fn default() -> Self {
        Self {
            num_outputs: default_num_outputs(),
            width: default_dimension(),
            height: default_dimension(),
            negative_prompt: None,
            style: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhoenixParams {
    #[serde(flatten)]
    pub image: ImageOptions,
    #[serde(default = "default_contrast")]
    pub contrast: f32,
    #[serde(default = "default_true")]
    pub alchemy: bool,
    #[serde(default)]
    pub enhance_prompt: bool,
    #[serde(default)]
    pub ultra: bool,
    #[serde(default)]
    pub upscale: bool,
    #[serde(default = "default_upscale_strength")]
    pub upscale_strength: f32,
}

impl Default for PhoenixParams {
    fn default() -> Self {
        Self {
            image: ImageOptions::default(),
            contrast: default_contrast(),
            alchemy: true,
            enhance_prompt: false,
            ultra: false,
            upscale: false,
            upscale_strength: default_upscale_strength(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FluxModel {
    #[default]
    Speed,
    Precision,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FluxParams {
    #[serde(flatten)]
    pub image: ImageOptions,
    #[serde(default)]
    pub model_type: FluxModel,
    #[serde(default = "default_contrast")]
    pub contrast: f32,
    #[serde(default)]
    pub enhance_prompt: bool,
    #[serde(default)]
    pub ultra: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PhotoRealVersion {
    V1,
    #[default]
    V2,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhotoRealParams {
    #[serde(flatten)]
    pub image: ImageOptions,
    #[serde(default, alias = "photoreal_version")]
    pub version: PhotoRealVersion,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photoreal_strength: Option<f32>,
    #[serde(default = "default_contrast")]
    pub contrast: f32,
    #[serde(default)]
    pub enhance_prompt: bool,
}

impl GenerationParams {
    pub fn model_name(&self) -> &'static str {
        match self {
            Self::Phoenix(_) => "phoenix",
            Self::Flux(_) => "flux",
            Self::PhotoReal(_) => "photoreal",
        }
    }

    pub fn image(&self) -> &ImageOptions {
        match self {
            Self::Phoenix(params) => &params.image,
            Self::Flux(params) => &params.image,
            Self::PhotoReal(params) => &params.image,
        }
    }

    pub fn validate(&self) -> Result<()> {
        match self {
            Self::Phoenix(params) => {
                validate_image(&params.image, Some(&PHOENIX_STYLES))?;
                validate_contrast(params.contrast)?;
                if params.alchemy && params.contrast < ALCHEMY_MIN_CONTRAST {
                    return Err(PromptbatchError::InvalidArgument(format!(
                        "alchemy requires contrast >= {ALCHEMY_MIN_CONTRAST}, got {}",
                        params.contrast
                    )));
                }
                if !(0.0..=1.0).contains(&params.upscale_strength) {
                    return Err(PromptbatchError::InvalidArgument(format!(
                        "upscale_strength must be within 0.0..=1.0, got {}",
                        params.upscale_strength
                    )));
                }
                Ok(())
            }
            Self::Flux(params) => {
                validate_image(&params.image, Some(&FLUX_STYLES))?;
                validate_contrast(params.contrast)
            }
            Self::PhotoReal(params) => {
                validate_image(&params.image, None)?;
                validate_contrast(params.contrast)?;
                let has_model = params
                    .model_id
                    .as_deref()
                    .is_some_and(|id| !id.trim().is_empty());
                if params.version == PhotoRealVersion::V2 && !has_model {
                    return Err(PromptbatchError::InvalidArgument(
                        "photoreal v2 requires a model_id".to_string(),
                    ));
                }
                if let Some(strength) = params.photoreal_strength
                    && !(0.1..=1.0).contains(&strength)
                {
                    return Err(PromptbatchError::InvalidArgument(format!(
                        "photoreal_strength must be within 0.1..=1.0, got {strength}"
                    )));
                }
                Ok(())
            }
        }
    }
}

fn validate_image(image: &ImageOptions, styles: Option<&[&str]>) -> Result<()> {
    if image.num_outputs == 0 || image.num_outputs > MAX_OUTPUTS_PER_JOB {
        return Err(PromptbatchError::InvalidArgument(format!(
            "num_outputs must be within 1..={MAX_OUTPUTS_PER_JOB}, got {}",
            image.num_outputs
        )));
    }

    for (name, value) in [("width", image.width), ("height", image.height)] {
        if !VALID_DIMENSIONS.contains(&value) {
            return Err(PromptbatchError::InvalidArgument(format!(
                "invalid {name} {value}; must be one of {VALID_DIMENSIONS:?}"
            )));
        }
    }

    if let (Some(style), Some(styles)) = (image.style.as_deref(), styles)
        && !styles.contains(&style)
    {
        return Err(PromptbatchError::InvalidArgument(format!(
            "unknown style '{style}'"
        )));
    }

    Ok(())
}

fn validate_contrast(contrast: f32) -> Result<()> {
    if VALID_CONTRASTS
        .iter()
        .any(|valid| (valid - contrast).abs() < 1e-3)
    {
        return Ok(());
    }
    Err(PromptbatchError::InvalidArgument(format!(
        "contrast must be one of {VALID_CONTRASTS:?}, got {contrast}"
    )))
}

fn default_num_outputs() -> u8 {
    1
}

fn default_dimension() -> u32 {
    1024
}

fn default_contrast() -> f32 {
    3.5
}

fn default_upscale_strength() -> f32 {
    0.5
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(value: serde_json::Value) -> GenerationParams {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn phoenix_defaults_are_valid() {
        let params = parse(serde_json::json!({ "model": "phoenix" }));
        let GenerationParams::Phoenix(phoenix) = &params else {
            panic!("expected phoenix params");
        };
        assert_eq!(phoenix.image.width, 1024);
        assert!(phoenix.alchemy);
        assert!(params.validate().is_ok());
    }

    #[test]
    fn num_images_alias_is_accepted() {
        let params = parse(serde_json::json!({ "model": "flux", "num_images": 4 }));
        assert_eq!(params.image().num_outputs, 4);
        assert_eq!(params.model_name(), "flux");
    }

    #[test]
    fn alchemy_rejects_low_contrast() {
        let params = GenerationParams::Phoenix(PhoenixParams {
            contrast: 1.8,
            ..PhoenixParams::default()
        });
        assert!(params.validate().is_err());

        let params = GenerationParams::Phoenix(PhoenixParams {
            contrast: 1.8,
            alchemy: false,
            ..PhoenixParams::default()
        });
        assert!(params.validate().is_ok());
    }

    #[test]
    fn rejects_off_grid_dimensions_and_unknown_styles() {
        let params = parse(serde_json::json!({ "model": "phoenix", "width": 1000 }));
        assert!(params.validate().is_err());

        let params = parse(serde_json::json!({ "model": "flux", "style": "Bokeh" }));
        assert!(params.validate().is_err());

        let params = parse(serde_json::json!({ "model": "phoenix", "style": "Bokeh" }));
        assert!(params.validate().is_ok());
    }

    #[test]
    fn photoreal_v2_requires_model() {
        let params = parse(serde_json::json!({ "model": "photoreal" }));
        assert!(params.validate().is_err());

        let params = parse(serde_json::json!({
            "model": "photoreal",
            "model_id": "aa77f04e-3eec-4034-9c07-d0f619684628"
        }));
        assert!(params.validate().is_ok());

        let params = parse(serde_json::json!({
            "model": "photoreal",
            "photoreal_version": "v1",
            "photoreal_strength": 0.05
        }));
        assert!(params.validate().is_err());
    }

    #[test]
    fn unknown_model_is_a_parse_error() {
        let parsed = serde_json::from_value::<GenerationParams>(serde_json::json!({
            "model": "dalle"
        }));
        assert!(parsed.is_err());
    }
}
