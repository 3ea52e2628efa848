/// Split a free-form command line into arguments.
///
/// Spaces separate arguments unless inside quotes. Either quote character
/// opens or closes a quoted run, and a quote preceded by a backslash inside
/// quotes is kept literally (the backslash is dropped).
pub fn parse_command_string(command: &str) -> Vec<String> {
    let mut argv = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut prev: Option<char> = None;

    for ch in command.chars() {
        match ch {
            ' ' if !in_quotes => {
                if !current.is_empty() {
                    argv.push(std::mem::take(&mut current));
                }
            }
            '"' | '\'' => {
                if in_quotes && prev == Some('\\') {
                    current.pop();
                    current.push(ch);
                } else {
                    in_quotes = !in_quotes;
                }
            }
            _ => current.push(ch),
        }
        prev = Some(ch);
    }

    if !current.is_empty() {
        argv.push(current);
    }
    argv
}

/// Arguments for the transcoding engine. A leading `ffmpeg` token is
/// accepted and dropped, since the engine name is implied.
pub fn engine_args(command: &str) -> Vec<String> {
    let mut argv = parse_command_string(command);
    if argv.first().is_some_and(|a| a == "ffmpeg") {
        argv.remove(0);
    }
    argv
}
