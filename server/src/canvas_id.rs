use rand::Rng;

use crate::error::HubError;

pub const MAX_CANVAS_ID_LEN: usize = 20;
pub const CANVAS_CODE_LEN: usize = 6;

// No O, 0, I or 1: codes get read aloud and typed by hand.
const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

pub fn generate_canvas_code(len: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())] as char)
        .collect()
}

pub fn validate_canvas_id(id: &str) -> Result<(), HubError> {
    if id.len() > MAX_CANVAS_ID_LEN {
        return Err(HubError::CanvasIdTooLong {
            max: MAX_CANVAS_ID_LEN,
        });
    }
    if id.is_empty() || !id.chars().all(|c| c.is_ascii_graphic()) {
        return Err(HubError::InvalidCanvasId);
    }
    Ok(())
}
