use std::process::Command;

fn git(args: &[&str]) -> Option<String> {
    Command::new("git")
        .args(args)
        .output()
        .ok()
        .filter(|output| output.status.success())
        .and_then(|output| String::from_utf8(output.stdout).ok())
        .map(|s| s.trim().to_string())
}

fn main() {
    let git_hash = git(&["rev-parse", "--short", "HEAD"]).unwrap_or_else(|| "unknown".to_string());
    let tagged = git(&["describe", "--exact-match", "--tags", "HEAD"]).is_some();

    // Untagged builds report the commit they were cut from
    let suffix = if tagged {
        String::new()
    } else {
        format!("-dev.{}", git_hash)
    };

    println!("cargo:rustc-env=RELAY_VERSION_SUFFIX={}", suffix);
    println!("cargo:rerun-if-changed=.git/HEAD");
    println!("cargo:rerun-if-changed=.git/refs/heads");
}
