//! Console deep links for deployed stacks

use regex::Regex;
use std::sync::LazyLock;

const CONSOLE_BASE: &str = "https://console.aws.amazon.com/cloudformation/home";

static STACK_ARN: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(
        r"^arn:aws:cloudformation:(?P<region>(us|eu|ap|sa|ca|me|af|il)-[a-z]+-\d+):\d{12}:stack/[^/]+/[^/]+$",
    )
    .ok()
});

/// Region of a well-formed regional stack ARN
pub fn stack_region(stack_id: &str) -> Option<&str> {
    let re = STACK_ARN.as_ref()?;
    re.captures(stack_id)
        .and_then(|c| c.name("region"))
        .map(|m| m.as_str())
}

/// Console link for `stack_id`
///
/// Only emitted for the public endpoint and a stack id that parses as a
/// regional stack ARN; everything else (local emulators, partitions we do not
/// recognise) gets no link.
pub fn console_url(stack_id: &str, public_endpoint: bool) -> Option<String> {
    if !public_endpoint {
        return None;
    }
    let region = stack_region(stack_id)?;
    Some(format!(
        "{}?region={}#/stacks/stackinfo?stackId={}",
        CONSOLE_BASE,
        region,
        escape_arn(stack_id)
    ))
}

fn escape_arn(arn: &str) -> String {
    let mut escaped = String::with_capacity(arn.len() + 16);
    for c in arn.chars() {
        match c {
            ':' => escaped.push_str("%3A"),
            '/' => escaped.push_str("%2F"),
            _ => escaped.push(c),
        }
    }
    escaped
}
