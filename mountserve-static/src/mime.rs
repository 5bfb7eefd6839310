//! MIME type handling

/// Content type for a file name, with a charset for text formats
pub fn content_type(name: &str) -> String {
    let guess = mime_guess::from_path(name).first_or_octet_stream();
    let essence = guess.essence_str();
    if guess.type_() == mime_guess::mime::TEXT
        || essence == "application/javascript"
        || essence == "application/json"
    {
        format!("{}; charset=utf-8", essence)
    } else {
        essence.to_string()
    }
}
