use crate::domain::language::{CommandKind, CommandLexicon};

/// Resolve a raw transcript to the command the user most likely meant.
///
/// The transcript is lowercased and trimmed, then each command kind is tried
/// in [`CommandKind::ALL`] order; the first kind with any phrase contained in
/// the transcript wins. Matching is plain substring containment, so a phrase
/// embedded in a longer sentence still matches.
pub fn match_command(transcript: &str, lexicon: &CommandLexicon) -> Option<CommandKind> {
    let text = transcript.trim().to_lowercase();
    if text.is_empty() {
        return None;
    }

    CommandKind::ALL.into_iter().find(|&kind| {
        lexicon
            .phrases(kind)
            .iter()
            .any(|phrase| text.contains(&phrase.trim().to_lowercase()))
    })
}
