//! Channel families shared by the tracer, the patch engine and the draft writer.

use fepbr_shared::ChannelFlags;

/// A physical material channel as it appears in an export document.
///
/// Each family can be fed by several semantic input names: the standard
/// shading node's name comes first, the parameter group's name second. The
/// first linked name wins when both are present.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ChannelFamily {
    BaseColor,
    MetallicRoughness,
    Normal,
    Occlusion,
    Emissive,
}

impl ChannelFamily {
    pub const ALL: [ChannelFamily; 5] = [
        ChannelFamily::BaseColor,
        ChannelFamily::MetallicRoughness,
        ChannelFamily::Normal,
        ChannelFamily::Occlusion,
        ChannelFamily::Emissive,
    ];

    /// Input names that feed this family, in priority order.
    pub fn semantic_names(self) -> &'static [&'static str] {
        match self {
            ChannelFamily::BaseColor => &["Base Color", "Albedo Map"],
            ChannelFamily::MetallicRoughness => &["Metallic", "Roughness"],
            ChannelFamily::Normal => &["Normal", "Normal Map"],
            ChannelFamily::Occlusion => &["Occlusion", "AO"],
            ChannelFamily::Emissive => &["Emission Color", "Emission"],
        }
    }

    /// Whether the family survives the user's channel selection.
    ///
    /// Base color also carries alpha and the metallic/roughness texture packs
    /// two channels, so those families are dropped only when both of their
    /// flags are off.
    pub fn is_enabled(self, flags: &ChannelFlags) -> bool {
        match self {
            ChannelFamily::BaseColor => flags.albedo || flags.alpha,
            ChannelFamily::MetallicRoughness => flags.metallic || flags.roughness,
            ChannelFamily::Normal => flags.normal,
            ChannelFamily::Occlusion => flags.ao,
            ChannelFamily::Emissive => flags.emission,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ChannelFamily::BaseColor => "base color",
            ChannelFamily::MetallicRoughness => "metallic/roughness",
            ChannelFamily::Normal => "normal",
            ChannelFamily::Occlusion => "occlusion",
            ChannelFamily::Emissive => "emissive",
        }
    }
}

impl std::fmt::Display for ChannelFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}
