use std::io::{self, Read};

/// Prompt for a secret on the terminal without echoing it
pub fn read_secret(prompt: &str) -> io::Result<String> {
    let secret = rpassword::prompt_password(prompt)?;
    Ok(secret.trim_end_matches(['\r', '\n']).to_string())
}

/// Helper function to read a message body from stdin until EOF
pub fn read_body<R: Read>(mut input: R) -> io::Result<String> {
    let mut body = String::new();
    input.read_to_string(&mut body)?;
    Ok(body)
}

/// Split a comma separated command-line value list, dropping blanks
pub fn split_list<'a, I>(values: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a String>,
{
    values
        .into_iter()
        .flat_map(|value| value.split(','))
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .collect()
}
