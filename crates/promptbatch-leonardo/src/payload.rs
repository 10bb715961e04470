use promptbatch_engine::params::{
    FluxModel, FluxParams, GenerationParams, ImageOptions, PhoenixParams, PhotoRealParams,
    PhotoRealVersion,
};
use serde_json::{Map, Value, json};

use crate::error::{LeonardoError, Result};

pub const PHOENIX_MODEL_ID: &str = "de7d3faf-762f-48e0-b3b7-9d0ac3a3fcf3";
pub const FLUX_SPEED_MODEL_ID: &str = "1dd50843-d653-4516-a8e3-f0238ee453ff";
pub const FLUX_PRECISION_MODEL_ID: &str = "b2614463-296c-462a-9586-aafdb8f00e36";
pub const UPSCALE_RATIO: u32 = 2;
pub const PHOTOREAL_V1_STRENGTH: f32 = 0.5;

const PHOENIX_STYLE_IDS: &[(&str, &str)] = &[
    ("3D Render", "debdf72a-91a4-467b-bf61-cc02bdeb69c6"),
    ("Bokeh", "9fdc5e8c-4d13-49b4-9ce6-5a74cbb19177"),
    ("Cinematic", "a5632c7c-ddbb-4e2f-ba34-8456ab3ac436"),
    ("Cinematic Concept", "33abbb99-03b9-4dd7-9761-ee98650b2c88"),
    ("Creative", "6fedbf1f-4a17-45ec-84fb-92fe524a29ef"),
    ("Dynamic", "111dc692-d470-4eec-b791-3475abac4c46"),
    ("Fashion", "594c4a08-a522-4e0e-b7ff-e4dac4b6b622"),
    ("Graphic Design Pop Art", "2e74ec31-f3a4-4825-b08b-2894f6d13941"),
    ("Graphic Design Vector", "1fbb6a68-9319-44d2-8d56-2957ca0ece6a"),
    ("HDR", "97c20e5c-1af6-4d42-b227-54d03d8f0727"),
    ("Illustration", "645e4195-f63d-4715-a3f2-3fb1e6eb8c70"),
    ("Macro", "30c1d34f-e3a9-479a-b56f-c018bbc9c02a"),
    ("Minimalist", "cadc8cd6-7838-4c99-b645-df76be8ba8d8"),
    ("Moody", "621e1c9a-6319-4bee-a12d-ae40659162fa"),
    ("None", "556c1ee5-ec38-42e8-955a-1e82dad0ffa1"),
    ("Portrait", "8e2bc543-6ee2-45f9-bcd9-594b6ce84dcd"),
    ("Pro B&W photography", "22a9a7d2-2166-4d86-80ff-22e2643adbcf"),
    ("Pro color photography", "7c3f932b-a572-47cb-9b9b-f20211e63b5b"),
    ("Pro film photography", "581ba6d6-5aac-4492-bebe-54c424a0d46e"),
    ("Portrait Fashion", "0d34f8e1-46d4-428f-8ddd-4b11811fa7c9"),
    ("Ray Traced", "b504f83c-3326-4947-82e1-7fe9e839ec0f"),
    ("Sketch (B&W)", "be8c6b58-739c-4d44-b9c1-b032ed308b61"),
    ("Sketch (Color)", "093accc3-7633-4ffd-82da-d34000dfc0d6"),
    ("Stock Photo", "5bdc3f2a-1be6-4d1c-8e77-992a30824a2c"),
    ("Vibrant", "dee282d3-891f-4f73-ba02-7f8131e5541b"),
];

const FLUX_STYLE_IDS: &[(&str, &str)] = &[
    ("3D Render", "debdf72a-91a4-467b-bf61-cc02bdeb69c6"),
    ("Acrylic", "3cbb655a-7ca4-463f-b697-8a03ad67327c"),
    ("Anime General", "b2a54a51-230b-4d4f-ad4e-8409bf58645f"),
    ("Creative", "6fedbf1f-4a17-45ec-84fb-92fe524a29ef"),
    ("Dynamic", "111dc692-d470-4eec-b791-3475abac4c46"),
    ("Fashion", "594c4a08-a522-4e0e-b7ff-e4dac4b6b622"),
    ("Game Concept", "09d2b5b5-d7c5-4c02-905d-9f84051640f4"),
    ("Graphic Design 3D", "7d7c2bc5-4b12-4ac3-81a9-630057e9e89f"),
    ("Illustration", "645e4195-f63d-4715-a3f2-3fb1e6eb8c70"),
    ("None", "556c1ee5-ec38-42e8-955a-1e82dad0ffa1"),
    ("Portrait", "8e2bc543-6ee2-45f9-bcd9-594b6ce84dcd"),
    ("Portrait Cinematic", "4edb03c9-8a26-4041-9d01-f85b5d4abd71"),
    ("Ray Traced", "b504f83c-3326-4947-82e1-7fe9e839ec0f"),
    ("Stock Photo", "5bdc3f2a-1be6-4d1c-8e77-992a30824a2c"),
    ("Watercolor", "1db308ce-c7ad-4d10-96fd-592fa6b75cc4"),
];

const PHOTOREAL_V1_PRESETS: &[(&str, &str)] = &[
    ("Cinematic", "CINEMATIC"),
    ("Creative", "CREATIVE"),
    ("Vibrant", "VIBRANT"),
];

const PHOTOREAL_V2_PRESETS: &[(&str, &str)] = &[
    ("Bokeh", "BOKEH"),
    ("Cinematic", "CINEMATIC"),
    ("Cinematic (Closeup)", "CINEMATIC_CLOSEUP"),
    ("Creative", "CREATIVE"),
    ("Fashion", "FASHION"),
    ("Film", "FILM"),
    ("Food", "FOOD"),
    ("HDR", "HDR"),
    ("Long Exposure", "LONG_EXPOSURE"),
    ("Macro", "MACRO"),
    ("Minimalistic", "MINIMALISTIC"),
    ("Monochrome", "MONOCHROME"),
    ("Moody", "MOODY"),
    ("Neutral", "NEUTRAL"),
    ("Portrait", "PORTRAIT"),
    ("Retro", "RETRO"),
    ("Stock Photo", "STOCK_PHOTO"),
    ("Vibrant", "VIBRANT"),
    ("Unprocessed", "UNPROCESSED"),
];

fn lookup(table: &[(&str, &'static str)], name: &str) -> Option<&'static str> {
    table
        .iter()
        .find(|(candidate, _)| *candidate == name)
        .map(|(_, id)| *id)
}

pub fn build_payload(prompt: &str, params: &GenerationParams) -> Result<Value> {
    match params {
        GenerationParams::Phoenix(params) => phoenix(prompt, params),
        GenerationParams::Flux(params) => flux(prompt, params),
        GenerationParams::PhotoReal(params) => photoreal(prompt, params),
    }
}

fn base(model_id: Option<&str>, prompt: &str, image: &ImageOptions) -> Map<String, Value> {
    let mut payload = Map::new();
    if let Some(model_id) = model_id {
        payload.insert("modelId".into(), json!(model_id));
    }
    payload.insert("prompt".into(), json!(prompt));
    payload.insert("num_images".into(), json!(image.num_outputs));
    payload.insert("width".into(), json!(image.width));
    payload.insert("height".into(), json!(image.height));
    payload
}

fn style_id(table: &[(&str, &'static str)], style: Option<&str>) -> Result<Option<&'static str>> {
    match style {
        None => Ok(None),
        Some(name) => lookup(table, name)
            .map(Some)
            .ok_or_else(|| LeonardoError::InvalidParams(format!("unknown style '{name}'"))),
    }
}

fn phoenix(prompt: &str, params: &PhoenixParams) -> Result<Value> {
    let mut payload = base(Some(PHOENIX_MODEL_ID), prompt, &params.image);
    payload.insert("contrast".into(), json!(params.contrast));
    payload.insert("alchemy".into(), json!(params.alchemy));
    payload.insert("enhancePrompt".into(), json!(params.enhance_prompt));

    if let Some(style) = style_id(PHOENIX_STYLE_IDS, params.image.style.as_deref())? {
        payload.insert("styleUUID".into(), json!(style));
    }
    if let Some(negative) = &params.image.negative_prompt {
        payload.insert("negativePrompt".into(), json!(negative));
    }
    if params.ultra {
        payload.insert("ultra".into(), json!(true));
    }
    if params.upscale {
        payload.insert("upscaleRatio".into(), json!(UPSCALE_RATIO));
        payload.insert("upscaleStrength".into(), json!(params.upscale_strength));
    }
    Ok(Value::Object(payload))
}

fn flux(prompt: &str, params: &FluxParams) -> Result<Value> {
    let model_id = match params.model_type {
        FluxModel::Speed => FLUX_SPEED_MODEL_ID,
        FluxModel::Precision => FLUX_PRECISION_MODEL_ID,
    };
    let mut payload = base(Some(model_id), prompt, &params.image);
    payload.insert("contrast".into(), json!(params.contrast));
    payload.insert("enhancePrompt".into(), json!(params.enhance_prompt));
    payload.insert("ultra".into(), json!(params.ultra));

    if let Some(negative) = &params.image.negative_prompt {
        payload.insert("negative_prompt".into(), json!(negative));
    }
    // "None" is a real style id for phoenix but means "no style" for flux.
    let style = params.image.style.as_deref().filter(|name| *name != "None");
    if let Some(style) = style_id(FLUX_STYLE_IDS, style)? {
        payload.insert("styleUUID".into(), json!(style));
    }
    Ok(Value::Object(payload))
}

fn photoreal(prompt: &str, params: &PhotoRealParams) -> Result<Value> {
    let (model_id, presets) = match params.version {
        PhotoRealVersion::V1 => (None, PHOTOREAL_V1_PRESETS),
        PhotoRealVersion::V2 => (params.model_id.as_deref(), PHOTOREAL_V2_PRESETS),
    };
    let mut payload = base(model_id, prompt, &params.image);
    payload.insert("photoReal".into(), json!(true));
    payload.insert("alchemy".into(), json!(true));
    payload.insert("contrast".into(), json!(params.contrast));
    payload.insert("enhancePrompt".into(), json!(params.enhance_prompt));

    match params.version {
        PhotoRealVersion::V1 => {
            let strength = params.photoreal_strength.unwrap_or(PHOTOREAL_V1_STRENGTH);
            if strength != PHOTOREAL_V1_STRENGTH {
                return Err(LeonardoError::InvalidParams(format!(
                    "photoreal v1 only supports strength {PHOTOREAL_V1_STRENGTH}"
                )));
            }
            payload.insert("photoRealStrength".into(), json!(strength));
        }
        PhotoRealVersion::V2 => {
            payload.insert("photoRealVersion".into(), json!("v2"));
        }
    }

    if let Some(preset) = style_id(presets, params.image.style.as_deref())? {
        payload.insert("presetStyle".into(), json!(preset));
    }
    if let Some(negative) = &params.image.negative_prompt {
        payload.insert("negative_prompt".into(), json!(negative));
    }
    Ok(Value::Object(payload))
}
