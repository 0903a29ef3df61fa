use std::sync::OnceLock;

use regex::Regex;

/// Expand `{{ env.VAR }}` placeholders in a raw TOML string
///
/// An optional fallback can be given as `{{ env.VAR | default("value") }}`;
/// it is used when the variable is unset instead of returning an error.
/// Comment lines are passed through untouched so commented-out credentials
/// do not fail the load.
pub fn expand_env(input: &str) -> Result<String, String> {
    fn placeholder() -> &'static Regex {
        static RE: OnceLock<Regex> = OnceLock::new();
        RE.get_or_init(|| {
            Regex::new(r#"\{\{\s*env\.([A-Za-z0-9_]+)\s*(?:\|\s*default\("([^"]*)"\))?\s*\}\}"#)
                .expect("must be valid regex")
        })
    }

    let mut output = String::with_capacity(input.len());

    for (i, line) in input.lines().enumerate() {
        if i > 0 {
            output.push('\n');
        }

        if line.trim_start().starts_with('#') {
            output.push_str(line);
            continue;
        }

        let mut last_end = 0;
        for captures in placeholder().captures_iter(line) {
            let overall = captures.get(0).expect("capture 0 always present");
            let var_name = &captures[1];

            output.push_str(&line[last_end..overall.start()]);

            match std::env::var(var_name) {
                Ok(value) => output.push_str(&value),
                Err(_) => match captures.get(2) {
                    Some(default) => output.push_str(default.as_str()),
                    None => return Err(format!("environment variable not found: `{var_name}`")),
                },
            }

            last_end = overall.end();
        }
        output.push_str(&line[last_end..]);
    }

    if input.ends_with('\n') {
        output.push('\n');
    }

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_placeholders() {
        let input = "key = \"value\"";
        assert_eq!(expand_env(input).unwrap(), input);
    }

    #[test]
    fn single_env_var() {
        temp_env::with_var("PRISM_TEST_KEY", Some("sk-test"), || {
            let result = expand_env("api_key = \"{{ env.PRISM_TEST_KEY }}\"").unwrap();
            assert_eq!(result, "api_key = \"sk-test\"");
        });
    }

    #[test]
    fn missing_env_var() {
        temp_env::with_var_unset("PRISM_MISSING", || {
            let err = expand_env("key = \"{{ env.PRISM_MISSING }}\"").unwrap_err();
            assert!(err.contains("PRISM_MISSING"));
        });
    }

    #[test]
    fn default_used_when_var_missing() {
        temp_env::with_var_unset("PRISM_OPTIONAL", || {
            let result = expand_env("key = \"{{ env.PRISM_OPTIONAL | default(\"fallback\") }}\"").unwrap();
            assert_eq!(result, "key = \"fallback\"");
        });
    }

    #[test]
    fn default_ignored_when_var_present() {
        temp_env::with_var("PRISM_OPTIONAL", Some("actual"), || {
            let result = expand_env("key = \"{{ env.PRISM_OPTIONAL | default(\"fallback\") }}\"").unwrap();
            assert_eq!(result, "key = \"actual\"");
        });
    }

    #[test]
    fn commented_lines_skip_expansion() {
        temp_env::with_var_unset("PRISM_MISSING", || {
            let input = "# api_key = \"{{ env.PRISM_MISSING }}\"";
            assert_eq!(expand_env(input).unwrap(), input);
        });
    }
}
