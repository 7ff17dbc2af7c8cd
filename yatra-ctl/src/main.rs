use anyhow::Context;
use yatra_api::{
    AuthToken, CommentId, CommentView, DeleteComment, FetchNotifications, Inbox, NewComment,
    NewSession, NewUser, NotificationFilter, NotificationId, PostId, SessionInfo, UserId, Uuid,
};

#[derive(structopt::StructOpt)]
struct Opt {
    #[structopt(short, long, env = "YATRA_HOST", default_value = "http://127.0.0.1:3000")]
    host: String,

    /// Session token, as printed by `signin`
    #[structopt(short, long, env = "YATRA_TOKEN")]
    token: Option<Uuid>,

    #[structopt(subcommand)]
    cmd: Command,
}

#[derive(structopt::StructOpt)]
enum Command {
    /// Create a user, requires ADMIN_TOKEN
    CreateUser {
        fullname: String,
        email: String,

        /// Initial password, the account can only sign in externally if unset
        #[structopt(long)]
        password: Option<String>,
    },

    /// Open a session and print its token
    Signin { email: String, password: String },

    /// Comment on a post, or reply to a comment
    Comment {
        post: Uuid,
        body: String,

        #[structopt(long)]
        parent: Option<Uuid>,

        /// Notification this reply is written from
        #[structopt(long)]
        notification: Option<Uuid>,
    },

    /// Delete a comment along with all its replies
    DeleteComment { comment: Uuid },

    /// Show one page of the inbox, marking it seen
    Inbox {
        /// One of all, like, comment, reply
        #[structopt(long, default_value = "all")]
        filter: String,

        #[structopt(long, default_value = "0")]
        skip: usize,
    },
}

fn admin_token() -> anyhow::Result<AuthToken> {
    let tok =
        std::env::var("ADMIN_TOKEN").context("retrieving ADMIN_TOKEN environment variable")?;
    let tok = Uuid::try_parse(&tok).context("parsing ADMIN_TOKEN as an auth token")?;
    Ok(AuthToken(tok))
}

struct Client {
    host: String,
    http: reqwest::Client,
}

impl Client {
    async fn post<Req, Resp>(
        &self,
        path: &str,
        token: Option<AuthToken>,
        body: &Req,
    ) -> anyhow::Result<Resp>
    where
        Req: serde::Serialize,
        Resp: for<'de> serde::Deserialize<'de>,
    {
        let mut req = self.http.post(format!("{}/api/{path}", self.host)).json(body);
        if let Some(AuthToken(token)) = token {
            req = req.bearer_auth(token);
        }
        let resp = req
            .send()
            .await
            .with_context(|| format!("sending request to {path}"))?;
        let status = resp.status();
        let bytes = resp
            .bytes()
            .await
            .with_context(|| format!("reading response of {path}"))?;
        if !status.is_success() {
            let err = yatra_api::Error::parse(&bytes)
                .with_context(|| format!("parsing {status} error response of {path}"))?;
            return Err(err.into());
        }
        // empty bodies stand for unit responses
        let bytes: &[u8] = if bytes.is_empty() { b"null" } else { &bytes };
        serde_json::from_slice(bytes).with_context(|| format!("parsing response of {path}"))
    }
}

fn print<T: serde::Serialize>(v: &T) -> anyhow::Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(v).context("serializing response")?
    );
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let opt = <Opt as structopt::StructOpt>::from_args();

    let client = Client {
        host: opt.host,
        http: reqwest::Client::new(),
    };
    let session = || {
        opt.token
            .map(AuthToken)
            .context("this command needs a session token, pass --token or set YATRA_TOKEN")
    };

    match opt.cmd {
        Command::CreateUser {
            fullname,
            email,
            password,
        } => {
            let id: UserId = client
                .post(
                    "admin/create-user",
                    Some(admin_token()?),
                    &NewUser {
                        fullname,
                        email,
                        password,
                    },
                )
                .await?;
            println!("{}", id.0);
        }
        Command::Signin { email, password } => {
            let info: SessionInfo = client
                .post(
                    "signin",
                    None,
                    &NewSession {
                        email,
                        password,
                        device: String::from("yatra-ctl"),
                    },
                )
                .await?;
            println!("{}", info.access_token.0);
        }
        Command::Comment {
            post,
            body,
            parent,
            notification,
        } => {
            let comment: CommentView = client
                .post(
                    "add-comment",
                    Some(session()?),
                    &NewComment {
                        post_id: PostId(post),
                        body,
                        parent: parent.map(CommentId),
                        notification_id: notification.map(NotificationId),
                    },
                )
                .await?;
            print(&comment)?;
        }
        Command::DeleteComment { comment } => {
            let () = client
                .post(
                    "delete-comment",
                    Some(session()?),
                    &DeleteComment {
                        comment_id: CommentId(comment),
                    },
                )
                .await?;
        }
        Command::Inbox { filter, skip } => {
            let filter: NotificationFilter =
                serde_json::from_value(serde_json::Value::String(filter.clone()))
                    .with_context(|| format!("unknown notification filter {filter:?}"))?;
            let inbox: Inbox = client
                .post(
                    "notifications",
                    Some(session()?),
                    &FetchNotifications { filter, skip },
                )
                .await?;
            print(&inbox)?;
        }
    }

    Ok(())
}
