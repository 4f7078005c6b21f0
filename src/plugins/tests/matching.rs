use super::*;

#[test]
fn wildcard_matches_subdomains_only() {
    assert!(host_matches("*.example.com", "cdn.example.com"));
    assert!(host_matches("*.example.com", "a.b.example.com"));
    assert!(!host_matches("*.example.com", "example.com"));
    assert!(!host_matches("*.example.com", "badexample.com"));
}

#[test]
fn wildcard_does_not_match_suffix_attack() {
    assert!(!host_matches("*.example.com", "example.com.evil.com"));
}

#[test]
fn exact_pattern_matches_only_that_host() {
    assert!(host_matches("files.test", "files.test"));
    assert!(!host_matches("files.test", "cdn.files.test"));
}

#[test]
fn matching_is_case_insensitive() {
    assert!(host_matches("*.mediafire.com", "WWW.MediaFire.com"));
    assert!(host_matches("files.test", "FILES.TEST"));
}

#[test]
fn trailing_dot_in_host_is_ignored() {
    assert!(host_matches("files.test", "files.test."));
}

#[test]
fn host_pattern_validation() {
    for good in ["example.com", "*.example.com", "localhost", "127.0.0.1", "a-b.c0m"] {
        assert!(is_valid_host_pattern(good), "{good} should be valid");
    }
    for bad in [
        "",
        "*.",
        "*",
        "Example.com",
        "ex ample.com",
        "a..b",
        ".example.com",
        "example.com.",
        "*.*.example.com",
        "foo.*.com",
        "-bad.com",
        "https://example.com",
    ] {
        assert!(!is_valid_host_pattern(bad), "{bad} should be invalid");
    }
}
