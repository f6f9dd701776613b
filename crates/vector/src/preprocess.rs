/// Clean text before it is sent to the embedding provider.
///
/// Escaped `\n` / `\t` sequences left over from transcription become spaces
/// and whitespace runs collapse to a single space.
pub fn preprocess_text(text: &str) -> String {
    text.replace("\\n", " ")
        .replace("\\t", " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
