use chrono::Utc;

fn main() {
    // 将构建时间注入环境变量，/api/health 返回 / Embed build time for the health endpoint
    let build_time = Utc::now().format("%Y-%m-%d %H:%M:%S UTC").to_string();
    println!("cargo:rustc-env=BUILD_TIME={}", build_time);

    println!("cargo:rerun-if-changed=build.rs");
}
