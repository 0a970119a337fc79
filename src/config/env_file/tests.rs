use super::*;
use tempfile::TempDir;

#[test]
fn parse_basic_lines() {
    let vars = parse_env_file(
        r#"
# Zoho credentials
ZOHO_CLIENT_ID=test_client_id
ZOHO_CLIENT_SECRET = "quoted secret"
export ZOHO_REFRESH_TOKEN='single'

ZOHO_ENVIRONMENT=sandbox
not a pair
=orphan
"#,
    );

    assert_eq!(vars.len(), 4);
    assert_eq!(vars["ZOHO_CLIENT_ID"], "test_client_id");
    assert_eq!(vars["ZOHO_CLIENT_SECRET"], "quoted secret");
    assert_eq!(vars["ZOHO_REFRESH_TOKEN"], "single");
    assert_eq!(vars["ZOHO_ENVIRONMENT"], "sandbox");
}

#[test]
fn value_may_contain_equals() {
    let vars = parse_env_file("ZOHO_REFRESH_TOKEN=1000.abc==\n");
    assert_eq!(vars["ZOHO_REFRESH_TOKEN"], "1000.abc==");
}

#[test]
fn mismatched_quotes_are_kept() {
    let vars = parse_env_file("KEY=\"open\n");
    assert_eq!(vars["KEY"], "\"open");
}

#[test]
fn blank_values_are_unset() {
    let source = EnvSource::from_pairs([
        ("EMPTY".to_string(), "   ".to_string()),
        ("SET".to_string(), " value ".to_string()),
    ]);

    assert_eq!(source.get("EMPTY"), None);
    assert_eq!(source.get("SET"), Some("value"));
    assert_eq!(source.get("MISSING"), None);
}

#[test]
fn from_file_reads_entries() {
    let temp_dir = TempDir::new().expect("should create TempDir successfully");
    let path = temp_dir.path().join("test.env");
    fs::write(&path, "ZOHO_ORGANIZATION_ID=test_org_id\n").expect("should write env file");

    let source = EnvSource::from_file(&path).expect("env file loads");
    assert_eq!(source.get("ZOHO_ORGANIZATION_ID"), Some("test_org_id"));
}

#[test]
fn from_file_missing_is_error() {
    let temp_dir = TempDir::new().expect("should create TempDir successfully");
    assert!(EnvSource::from_file(&temp_dir.path().join("absent.env")).is_err());
}

#[test]
fn inline_comments_end_unquoted_values() {
    let vars = parse_env_file(
        "ZOHO_ENVIRONMENT=sandbox # switch before release\nZOHO_CLIENT_ID=abc#123\nZOHO_CLIENT_SECRET=\"keep # this\" # but not this\n",
    );

    assert_eq!(vars["ZOHO_ENVIRONMENT"], "sandbox");
    assert_eq!(vars["ZOHO_CLIENT_ID"], "abc#123");
    assert_eq!(vars["ZOHO_CLIENT_SECRET"], "keep # this");
}

#[test]
fn double_quotes_unescape() {
    let vars = parse_env_file(
        r#"
MULTILINE="first\nsecond"
QUOTED="say \"hi\" \\ done"
LITERAL='no \n escapes'
"#,
    );

    assert_eq!(vars["MULTILINE"], "first\nsecond");
    assert_eq!(vars["QUOTED"], "say \"hi\" \\ done");
    assert_eq!(vars["LITERAL"], "no \\n escapes");
}

mod process_environment {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn missing_env_file_falls_back_to_process() {
        let temp_dir = TempDir::new().expect("should create TempDir successfully");

        // SAFETY: serialized with every other test that touches the environment
        unsafe {
            std::env::set_var(ENV_FILE_VAR, temp_dir.path().join("absent.env"));
            std::env::set_var("ZOHO_ORGANIZATION_ID", "process_org");
        }
        let source = EnvSource::detect();
        // SAFETY: see above
        unsafe {
            std::env::remove_var(ENV_FILE_VAR);
            std::env::remove_var("ZOHO_ORGANIZATION_ID");
        }

        let source = source.expect("missing env file is not fatal");
        assert_eq!(source.get("ZOHO_ORGANIZATION_ID"), Some("process_org"));
    }

    #[cfg(unix)]
    #[test]
    #[serial]
    fn non_utf8_variables_are_skipped() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let bad = OsStr::from_bytes(b"\xff\xfe");
        // SAFETY: serialized with every other test that touches the environment
        unsafe {
            std::env::remove_var(ENV_FILE_VAR);
            std::env::set_var("SCAFLOG_UNRELATED_BYTES", bad);
            std::env::set_var("ZOHO_ORGANIZATION_ID", bad);
            std::env::set_var("ZOHO_CLIENT_ID", "readable");
        }
        let source = EnvSource::detect();
        // SAFETY: see above
        unsafe {
            std::env::remove_var("SCAFLOG_UNRELATED_BYTES");
            std::env::remove_var("ZOHO_ORGANIZATION_ID");
            std::env::remove_var("ZOHO_CLIENT_ID");
        }

        let source = source.expect("non-UTF-8 variables do not break detection");
        assert_eq!(source.get("ZOHO_ORGANIZATION_ID"), None);
        assert_eq!(source.get("ZOHO_CLIENT_ID"), Some("readable"));
    }

    #[test]
    #[serial]
    fn only_zoho_variables_are_read() {
        // SAFETY: serialized with every other test that touches the environment
        unsafe {
            std::env::remove_var(ENV_FILE_VAR);
            std::env::set_var("SCAFLOG_UNRELATED", "value");
        }
        let source = EnvSource::detect();
        // SAFETY: see above
        unsafe {
            std::env::remove_var("SCAFLOG_UNRELATED");
        }

        let source = source.expect("environment detects");
        assert_eq!(source.get("SCAFLOG_UNRELATED"), None);
    }
}
