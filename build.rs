fn main() {
    let now = time::OffsetDateTime::now_utc();
    let month = now.month().to_string();
    let stamp_date = format!("{} {:>2} {}", &month[..3], now.day(), now.year());
    let stamp_time = format!("{:02}:{:02}:{:02}", now.hour(), now.minute(), now.second());

    let date = std::env::var("KDICT_BUILD_DATE").unwrap_or(stamp_date);
    let time = std::env::var("KDICT_BUILD_TIME").unwrap_or(stamp_time);

    println!("cargo:rerun-if-env-changed=KDICT_BUILD_DATE");
    println!("cargo:rerun-if-env-changed=KDICT_BUILD_TIME");
    println!("cargo:rustc-env=KDICT_BUILD_DATE={}", date);
    println!("cargo:rustc-env=KDICT_BUILD_TIME={}", time);
}
