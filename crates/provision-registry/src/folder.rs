//! The closed set of model folders a download may target.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::RegistryError;

macro_rules! model_folders {
    ($($variant:ident => $name:literal,)*) => {
        /// A model folder under the models directory.
        ///
        /// Folder names are strict: anything outside this set is rejected.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub enum ModelFolder {
            $($variant,)*
        }

        impl ModelFolder {
            /// Every folder, in declaration order.
            pub const ALL: &'static [ModelFolder] = &[$(ModelFolder::$variant,)*];

            /// The on-disk folder name (may contain a `/`).
            pub fn as_str(self) -> &'static str {
                match self {
                    $(ModelFolder::$variant => $name,)*
                }
            }
        }
    };
}

model_folders! {
    Checkpoints => "checkpoints",
    Clip => "clip",
    ClipVision => "clip_vision",
    Configs => "configs",
    Controlnet => "controlnet",
    ControlnetFlux => "controlnet/flux",
    Diffusers => "diffusers",
    DiffusionModels => "diffusion_models",
    Embeddings => "embeddings",
    Gligen => "gligen",
    Hypernetworks => "hypernetworks",
    Loras => "loras",
    Photomaker => "photomaker",
    StyleModels => "style_models",
    Unet => "unet",
    UpscaleModels => "upscale_models",
    Vae => "vae",
    VaeApprox => "vae_approx",
    Sam2 => "sam2",
    UltralyticsBbox => "ultralytics/bbox",
    UltralyticsSegm => "ultralytics/segm",
    Mmdets => "mmdets",
    Onnx => "onnx",
    Liveportrait => "liveportrait",
}

impl ModelFolder {
    /// Comma-separated list of valid names, for error messages.
    pub fn valid_names() -> String {
        ModelFolder::ALL
            .iter()
            .map(|f| f.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for ModelFolder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelFolder {
    type Err = RegistryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ModelFolder::ALL
            .iter()
            .copied()
            .find(|f| f.as_str() == s)
            .ok_or_else(|| RegistryError::Validation {
                field: "folder",
                input: s.to_string(),
                reason: format!("expected one of: {}", ModelFolder::valid_names()),
            })
    }
}

impl Serialize for ModelFolder {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ModelFolder {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
