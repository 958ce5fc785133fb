use retus::{Error, RequestOptions, Retry, Timeout};

fn main() -> anyhow::Result<()> {
    // RETUS_* variables override the built-in settings below.
    let env = RequestOptions::from_env().map_err(anyhow::Error::msg)?;
    let api = retus::create(
        RequestOptions::new()
            .prefix_url("https://httpbin.org/")
            .timeout(Timeout::from_millis(5_000))
            .header("accept", "application/json")
            .merge(env),
    );

    let patient = api.extend(RequestOptions::new().retry(Retry::new(3).with_delay(500)));

    match patient.get("status/418", ()) {
        Ok(response) => println!("unexpected success: {}", response.status_code),
        Err(Error::Http(err)) => println!("http error {}: {err}", err.status_code()),
        Err(other) => return Err(other.into()),
    }

    let lenient = api.extend(RequestOptions::new().throw_http_errors(false));
    let response = lenient.get("/status/404", ())?;
    println!("status {} with body {:?}", response.status_code, response.body);

    Ok(())
}
