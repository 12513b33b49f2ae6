use std::io::{self, BufRead, Write};
use ttlkv::client::Client;
use ttlkv::store::item::expires_in;

const DEFAULT_TTL_SECS: i64 = 60;

#[tokio::main]
async fn main() -> io::Result<()> {
    let mut host = "127.0.0.1".to_string();
    let mut port = 8080u16;

    let args: Vec<String> = std::env::args().skip(1).collect();
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--host" | "-h" => {
                if i + 1 < args.len() {
                    host = args[i + 1].clone();
                    i += 1;
                }
            }
            "--port" | "-p" => {
                if i + 1 < args.len() {
                    if let Ok(p) = args[i + 1].parse() {
                        port = p;
                    }
                    i += 1;
                }
            }
            _ => {}
        }
        i += 1;
    }

    let addr = format!("{host}:{port}");
    let mut client = Client::connect(&addr).await?;
    eprintln!("Connected to {addr}");

    let stdin = io::stdin();
    let mut reader = stdin.lock();

    loop {
        print!("ttlkv> ");
        io::stdout().flush()?;

        let mut line = String::new();
        let n = reader.read_line(&mut line)?;
        if n == 0 {
            break; // EOF
        }

        let tokens: Vec<&str> = line.split_whitespace().collect();
        let Some(cmd) = tokens.first() else {
            continue;
        };

        let output = match (cmd.to_uppercase().as_str(), &tokens[1..]) {
            ("GET", [key]) => client.get(key).await.map(|v| format!("\"{v}\"")),
            ("PUT", [key, value]) => put(&mut client, key, value, DEFAULT_TTL_SECS).await,
            ("PUT", [key, value, ttl]) => match ttl.parse::<i64>() {
                Ok(ttl) => put(&mut client, key, value, ttl).await,
                Err(_) => {
                    println!("(error) ttl must be a number of seconds");
                    continue;
                }
            },
            ("DELETE" | "DEL", [key]) => client.delete(key).await.map(|_| "OK".to_string()),
            ("QUIT" | "EXIT", []) => break,
            _ => {
                println!("(error) usage: GET key | PUT key value [ttl_secs] | DELETE key");
                continue;
            }
        };

        match output {
            Ok(text) => println!("{text}"),
            Err(e) => println!("(error) {e}"),
        }
    }

    Ok(())
}

async fn put(client: &mut Client, key: &str, value: &str, ttl: i64) -> ttlkv::error::KvResult<String> {
    client
        .put(key, value, expires_in(ttl))
        .await
        .map(|_| "OK".to_string())
}
