//! Output targets and the shading language each one is printed in.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::stage::Stage;

/// Shading language family a target is printed in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SourceLanguage {
    Glsl,
    Hlsl,
    Metal,
}

impl SourceLanguage {
    pub fn name(self) -> &'static str {
        match self {
            SourceLanguage::Glsl => "glsl",
            SourceLanguage::Hlsl => "hlsl",
            SourceLanguage::Metal => "metal",
        }
    }
}

/// How the printed source becomes a stage artifact.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BackendMode {
    /// The source text itself, NUL terminated.
    Text,
    /// Bytecode from an external shader compiler.
    Compiled,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Target {
    Glsl,
    Hlsl,
    Dxbc,
    Dxil,
    VulkanSpirv,
    Metal,
    MetalBinMac,
    MetalBinIos,
    MetalBinTvos,
}

impl Target {
    pub const ALL: [Target; 9] = [
        Target::Glsl,
        Target::Hlsl,
        Target::Dxbc,
        Target::Dxil,
        Target::VulkanSpirv,
        Target::Metal,
        Target::MetalBinMac,
        Target::MetalBinIos,
        Target::MetalBinTvos,
    ];

    /// Command-line and config spelling.
    pub fn name(self) -> &'static str {
        match self {
            Target::Glsl => "glsl",
            Target::Hlsl => "hlsl",
            Target::Dxbc => "dxbc",
            Target::Dxil => "dxil",
            Target::VulkanSpirv => "vulkan-spirv",
            Target::Metal => "metal",
            Target::MetalBinMac => "metal-bin-mac",
            Target::MetalBinIos => "metal-bin-ios",
            Target::MetalBinTvos => "metal-bin-tvos",
        }
    }

    /// Enumerator name in the runtime's `Target` enum.
    pub fn runtime_name(self) -> &'static str {
        match self {
            Target::Glsl => "GLSL",
            Target::Hlsl => "HLSL",
            Target::Dxbc => "DXBC",
            Target::Dxil => "DXIL",
            Target::VulkanSpirv => "VULKAN_SPIRV",
            Target::Metal => "METAL",
            Target::MetalBinMac => "METAL_BIN_MAC",
            Target::MetalBinIos => "METAL_BIN_IOS",
            Target::MetalBinTvos => "METAL_BIN_TVOS",
        }
    }

    pub fn runtime_value(self) -> i64 {
        self as i64
    }

    pub fn language(self) -> SourceLanguage {
        match self {
            Target::Glsl => SourceLanguage::Glsl,
            Target::Hlsl | Target::Dxbc | Target::Dxil | Target::VulkanSpirv => {
                SourceLanguage::Hlsl
            }
            Target::Metal | Target::MetalBinMac | Target::MetalBinIos | Target::MetalBinTvos => {
                SourceLanguage::Metal
            }
        }
    }

    pub fn backend(self) -> BackendMode {
        match self {
            Target::Dxbc | Target::Dxil | Target::VulkanSpirv => BackendMode::Compiled,
            _ => BackendMode::Text,
        }
    }

    /// Shader model profile handed to the external compiler.
    pub fn profile(self, stage: Stage) -> Option<String> {
        let model = match self {
            Target::Dxbc => "5_0",
            Target::Dxil | Target::VulkanSpirv => "6_0",
            _ => return None,
        };
        let prefix = match stage {
            Stage::Host => return None,
            Stage::Vertex => "vs",
            Stage::Control => "hs",
            Stage::Evaluation => "ds",
            Stage::Geometry => "gs",
            Stage::Fragment => "ps",
        };
        Some(format!("{}_{}", prefix, model))
    }

    pub fn emits_spirv(self) -> bool {
        self == Target::VulkanSpirv
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Target {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Target::ALL
            .into_iter()
            .find(|t| t.name() == s)
            .ok_or_else(|| format!("unknown hsh target '{}'", s))
    }
}
