//! Token locking script construction and inspection.

pub mod stas;
pub mod templates;

pub use stas::{
    build_token_script, detect_version, extract_owner, extract_redemption, is_p2pkh_script,
    is_splittable, is_token_script, is_token_script_bytes, recipient_hash, same_lineage,
    update_owner, StasScript, Version,
};
