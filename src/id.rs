//! Resource ID generation.
//!
//! Format: [4-char prefix][26-char nanoid] = 30 chars total.
//! The suffix alphabet is lowercase alphanumeric so IDs are safe inside object
//! keys and URLs without escaping.

const ID_ALPHABET: [char; 36] = [
    '0', '1', '2', '3', '4', '5', '6', '7', '8', '9', 'a', 'b', 'c', 'd', 'e', 'f', 'g', 'h', 'i',
    'j', 'k', 'l', 'm', 'n', 'o', 'p', 'q', 'r', 's', 't', 'u', 'v', 'w', 'x', 'y', 'z',
];

/// The type of resource ID, determining its prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceId {
    Dataset,
}

impl ResourceId {
    pub const fn prefix(&self) -> &'static str {
        match self {
            Self::Dataset => "dset",
        }
    }
}

pub fn generate_id(resource: ResourceId) -> String {
    let suffix = nanoid::nanoid!(26, &ID_ALPHABET);
    format!("{}{}", resource.prefix(), suffix)
}

/// Generate a dataset ID (prefix: "dset").
pub fn generate_dataset_id() -> String {
    generate_id(ResourceId::Dataset)
}
