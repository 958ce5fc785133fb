use retus::{RequestOptions, ResponseType};

fn main() -> anyhow::Result<()> {
    let url = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "https://httpbin.org/get".to_owned());

    let response = retus::get(&url, ())?;
    println!("{} {}", response.status_code, url);
    for (name, value) in &response.headers {
        println!("{name}: {value:?}");
    }

    let echoed = retus::post(
        "https://httpbin.org/post",
        RequestOptions::new()
            .json(serde_json::json!({ "name": "Kit" }))
            .response_type(ResponseType::Json),
    )?;
    println!("{:#}", echoed.body.as_json().cloned().unwrap_or_default());

    Ok(())
}
