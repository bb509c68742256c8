use std::io::{self, Write};
use chrono::{DateTime, FixedOffset};
use clap::Parser;
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use facestore::model::{CreatedId, Face, NewFace};
use facestore::parser::{self, Command};

#[derive(Parser, Clone, Debug)]
#[clap(author, version, about = "Interactive client for a FaceStore server", long_about = None)]
struct Args {
    /// host:port of the FaceStore server
    #[clap(long, default_value = "127.0.0.1:8080")]
    host: String,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

struct Session {
    client: Client,
    base: String,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    print_banner();

    let session = Session {
        client: Client::new(),
        base: format!("http://{}", args.host),
    };

    match session.client.get(session.url("/face/")).send().await {
        Ok(_) => println!("[\u{2713}] Connected to FaceStore at {}!", args.host),
        Err(_) => {
            println!("[\u{2717}] Could not connect to server at {}.", args.host);
            println!("    Make sure to run 'cargo run --bin facestore' in another terminal.");
            return;
        }
    }
    println!("Type 'HELP' for supported commands or 'EXIT' to quit.\n");

    let stdin = io::stdin();
    let mut buffer = String::new();

    loop {
        print!("facestore> ");
        if io::stdout().flush().is_err() { break; }
        buffer.clear();

        match stdin.read_line(&mut buffer) {
            Ok(0) | Err(_) => break,
            Ok(_) => {}
        }
        if buffer.trim().is_empty() { continue; }

        match parser::parse_command(&buffer) {
            Ok(Command::Exit) => break,
            Ok(cmd) => {
                if let Err(e) = session.execute(cmd).await {
                    println!("[\u{26a0}\u{fe0f} Error] {}", e);
                }
            }
            Err(e) => {
                println!("[\u{2717} Syntax Error] {}", e);
                if buffer.to_uppercase().starts_with("CREATE") {
                    println!("    \u{2139}\u{fe0f}  Hint: Try 'CREATE \"text\" TAGS a, b DUE 2024-05-01T00:00:00Z'");
                } else if buffer.to_uppercase().starts_with("DUE") {
                    println!("    \u{2139}\u{fe0f}  Hint: Try 'DUE 2024-05-01'");
                }
            }
        }
    }
}

fn print_banner() {
    println!("\n==================================================");
    println!("   FaceStore CLI v0.1");
    println!("==================================================\n");
}

fn print_help() {
    println!("\n--- Available Commands ---");
    println!("1. CREATE:      CREATE \"text\" [TAGS a, b] DUE 2024-05-01T00:00:00Z");
    println!("2. GET:         GET <id>");
    println!("3. DELETE:      DELETE <id>");
    println!("4. DELETE ALL:  DELETE ALL");
    println!("5. LIST:        LIST");
    println!("6. BY TAG:      TAG <tag>");
    println!("7. BY DUE DATE: DUE <year>-<month>-<day>");
    println!("8. EXIT:        Quit\n");
}

fn print_faces(faces: &[Face]) {
    println!("\nFound {} faces:", faces.len());
    let mut faces = faces.to_vec();
    faces.sort_by_key(|f| f.id);
    for face in &faces {
        print_face(face);
    }
    println!();
}

fn print_face(face: &Face) {
    println!("  \u{2022} [{}] \"{}\" due {} tags [{}]", face.id, face.text, face.due.to_rfc3339(), face.tags.join(", "));
}

impl Session {
    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    async fn execute(&self, cmd: Command) -> Result<(), String> {
        match cmd {
            Command::Help => { print_help(); Ok(()) },
            Command::Create { text, tags, due } => self.perform_create(text, tags, due).await,
            Command::Get { id } => self.perform_get(id).await,
            Command::Delete { id } => self.perform_delete(id).await,
            Command::DeleteAll => self.perform_delete_all().await,
            Command::List => self.perform_list("/face/".to_string()).await,
            Command::Tag { tag } => self.perform_list(format!("/tag/{}", urlencoding::encode(&tag))).await,
            Command::Due { year, month, day } => self.perform_list(format!("/due/{}/{}/{}", year, month, day)).await,
            Command::Exit => Ok(()),
        }
    }

    // --- NETWORK HANDLERS ---

    async fn perform_create(&self, text: String, tags: Vec<String>, due: DateTime<FixedOffset>) -> Result<(), String> {
        let body = NewFace { text, tags, due };
        let resp = self.client.post(self.url("/face/")).json(&body).send().await.map_err(|e| e.to_string())?;
        let created: CreatedId = check(resp).await?.json().await.map_err(|e| e.to_string())?;
        println!("[\u{2713} OK] Created ID: {}", created.id);
        Ok(())
    }

    async fn perform_get(&self, id: u64) -> Result<(), String> {
        let resp = self.client.get(self.url(&format!("/face/{}", id))).send().await.map_err(|e| e.to_string())?;
        if resp.status() == StatusCode::NOT_FOUND {
            println!("[\u{2717}] ID Not Found.");
            return Ok(());
        }
        let face: Face = check(resp).await?.json().await.map_err(|e| e.to_string())?;
        print_face(&face);
        Ok(())
    }

    async fn perform_delete(&self, id: u64) -> Result<(), String> {
        let resp = self.client.delete(self.url(&format!("/face/{}", id))).send().await.map_err(|e| e.to_string())?;
        check(resp).await?;
        println!("[\u{2713} OK] Deleted ID: {}", id);
        Ok(())
    }

    async fn perform_delete_all(&self) -> Result<(), String> {
        let resp = self.client.delete(self.url("/face/")).send().await.map_err(|e| e.to_string())?;
        check(resp).await?;
        println!("[\u{2713} OK] Deleted all faces");
        Ok(())
    }

    async fn perform_list(&self, path: String) -> Result<(), String> {
        let resp = self.client.get(self.url(&path)).send().await.map_err(|e| e.to_string())?;
        let faces: Vec<Face> = check(resp).await?.json().await.map_err(|e| e.to_string())?;
        print_faces(&faces);
        Ok(())
    }
}

/// Turns a non-2xx reply into the server's error message.
async fn check(resp: Response) -> Result<Response, String> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let message = match resp.json::<ErrorBody>().await {
        Ok(body) => body.error,
        Err(_) => "no details".to_string(),
    };
    Err(format!("{} ({})", message, status))
}
