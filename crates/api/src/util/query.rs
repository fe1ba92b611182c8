/// Looks up the raw value of a query parameter.
pub fn find<'q>(query: &'q str, name: &str) -> Option<&'q str> {
    for chunk in query.split('&') {
        let (key, value) = match chunk.split_once('=') {
            Some(pair) => pair,
            _ => continue,
        };
        if key == name {
            return Some(value);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::find;

    #[test]
    fn picks_the_named_parameter() {
        assert_eq!(find("slug=week-1&id=3", "id"), Some("3"));
        assert_eq!(find("slug=week-1&id=3", "slug"), Some("week-1"));
        assert_eq!(find("flag&id=", "id"), Some(""));
        assert_eq!(find("", "id"), None);
    }
}
