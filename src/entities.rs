/// Entities recognized in transcript text, in replacement order.
///
/// `&amp;` goes first so the other replacements see the ampersand it produces.
const ENTITIES: [(&str, &str); 6] = [
    ("&amp;", "&"),
    ("&lt;", "<"),
    ("&gt;", ">"),
    ("&quot;", "\""),
    ("&#39;", "'"),
    ("&nbsp;", " "),
];

/// Decode the small fixed set of HTML character references YouTube emits.
///
/// Anything else passes through untouched. `None` decodes to an empty string.
pub fn decode_entities<'a>(input: impl Into<Option<&'a str>>) -> String {
    let Some(input) = input.into() else {
        return String::new();
    };
    if !input.contains('&') {
        return input.to_string();
    }
    ENTITIES
        .iter()
        .fold(input.to_string(), |text, (entity, replacement)| text.replace(entity, replacement))
}
