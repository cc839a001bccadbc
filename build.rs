use time::format_description::FormatItem;
use time::macros::format_description;
use time::OffsetDateTime;

const DATE_FORMAT: &[FormatItem<'static>] = format_description!("[year]-[month]-[day]");
const TIME_FORMAT: &[FormatItem<'static>] = format_description!("[hour]:[minute]:[second]");

/// `var` from the environment, else `now` rendered with `format`.
fn stamp(var: &str, now: OffsetDateTime, format: &[FormatItem<'_>]) -> String {
    std::env::var(var).unwrap_or_else(|_| now.format(format).unwrap_or_else(|_| "unknown".to_string()))
}

fn main() {
    let now = OffsetDateTime::now_utc();
    let date = stamp("NCTREE_BUILD_DATE", now, DATE_FORMAT);
    let time = stamp("NCTREE_BUILD_TIME", now, TIME_FORMAT);

    println!("cargo:rustc-env=NCTREE_BUILD_DATE={}", date);
    println!("cargo:rustc-env=NCTREE_BUILD_TIME={}", time);
    println!("cargo:rerun-if-env-changed=NCTREE_BUILD_DATE");
    println!("cargo:rerun-if-env-changed=NCTREE_BUILD_TIME");
}
