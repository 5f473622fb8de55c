//! Canned assistant replies used by clients when the relay cannot answer.
//!
//! Kept apart from `RelayError`: the relay always reports its failures, and
//! only the client decides to paper over them.

pub const PROGRAM_REPLY: &str = "🌱 Program Adiwiyata adalah program penghargaan yang diberikan kepada sekolah yang berhasil dalam upaya pelestarian lingkungan hidup...";

pub const WASTE_REPLY: &str = "♻️ Beberapa cara mengurangi sampah di sekolah:\n\n1. **Pisahkan sampah** - Sediakan tempat sampah terpisah...";

pub const GENERIC_REPLY: &str = "🤔 Terima kasih atas pertanyaannya! Untuk demo ini, coba tanyakan tentang program Adiwiyata atau pengelolaan sampah...";

/**
 * \brief Keyword match on the last user message, case-insensitive.
 */
pub fn canned_reply(last_user_message: &str) -> &'static str {
    let text = last_user_message.to_lowercase();
    if text.contains("adiwiyata") || text.contains("program") {
        PROGRAM_REPLY
    } else if text.contains("sampah") || text.contains("daur ulang") {
        WASTE_REPLY
    } else {
        GENERIC_REPLY
    }
}
