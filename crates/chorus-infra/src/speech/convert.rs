//! Audio conversion adapter.
//!
//! Only conversions between aliases of the same container are supported
//! (`audio/wav` and `audio/x-wav`, say). Anything else is reported as a
//! conversion error so the reply still goes out without speech.

use chorus_core::speech::AudioConverter;
use chorus_types::error::SpeechError;
use chorus_types::speech::extension_for;

#[derive(Debug, Default, Clone, Copy)]
pub struct PassthroughConverter;

impl AudioConverter for PassthroughConverter {
    fn convert(&self, audio: Vec<u8>, from: &str, to: &str) -> Result<Vec<u8>, SpeechError> {
        let same = from.eq_ignore_ascii_case(to)
            || (extension_for(from) != "bin" && extension_for(from) == extension_for(to));
        if same {
            Ok(audio)
        } else {
            Err(SpeechError::Conversion {
                from: from.to_string(),
                to: to.to_string(),
            })
        }
    }
}
