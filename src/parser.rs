use chrono::{DateTime, FixedOffset};
use nom::{
    branch::alt,
    bytes::complete::{tag_no_case, take_until, take_while1},
    character::complete::{char, digit1, multispace0, multispace1},
    combinator::{map, map_res, opt, recognize, value, verify},
    multi::separated_list1,
    sequence::{delimited, preceded, tuple},
    IResult,
};

#[derive(Debug, PartialEq, Clone)]
pub enum Command {
    Create { text: String, tags: Vec<String>, due: DateTime<FixedOffset> },
    Get { id: u64 },
    Delete { id: u64 },
    DeleteAll,
    List,
    Tag { tag: String },
    Due { year: i32, month: u32, day: u32 },
    Help,
    Exit,
}

// --- BASIC PARSERS ---

fn parse_u64(input: &str) -> IResult<&str, u64> {
    map_res(digit1, |s: &str| s.parse::<u64>())(input)
}

fn parse_u32(input: &str) -> IResult<&str, u32> {
    map_res(digit1, |s: &str| s.parse::<u32>())(input)
}

fn parse_i32(input: &str) -> IResult<&str, i32> {
    map_res(recognize(tuple((opt(char('-')), digit1))), |s: &str| s.parse::<i32>())(input)
}

fn parse_quoted_string(input: &str) -> IResult<&str, String> {
    let (input, _) = char('"')(input)?;
    let (input, content) = take_until("\"")(input)?;
    let (input, _) = char('"')(input)?;
    Ok((input, content.to_string()))
}

fn parse_bare_word(input: &str) -> IResult<&str, String> {
    map(take_while1(|c: char| !c.is_whitespace() && c != ','), String::from)(input)
}

fn parse_word(input: &str) -> IResult<&str, String> {
    alt((parse_quoted_string, parse_bare_word))(input)
}

fn parse_timestamp(input: &str) -> IResult<&str, DateTime<FixedOffset>> {
    let (rest, raw) = take_while1(|c: char| !c.is_whitespace())(input)?;
    match DateTime::parse_from_rfc3339(raw) {
        Ok(ts) => Ok((rest, ts)),
        Err(_) => Err(nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Verify))),
    }
}

// --- HELPERS ---
fn ws<'a, F, O, E: nom::error::ParseError<&'a str>>(inner: F) -> impl FnMut(&'a str) -> IResult<&'a str, O, E>
where F: FnMut(&'a str) -> IResult<&'a str, O, E> {
    delimited(multispace0, inner, multispace0)
}

fn tag_ci(t: &'static str) -> impl FnMut(&str) -> IResult<&str, &str> {
    move |input| tag_no_case(t)(input)
}

// --- COMMAND PARSERS ---

fn parse_create(input: &str) -> IResult<&str, Command> {
    let (input, _) = tag_ci("CREATE")(input)?;
    let (input, _) = multispace1(input)?;
    let (input, text) = parse_quoted_string(input)?;

    let (input, tags) = opt(preceded(
        ws(tag_ci("TAGS")),
        separated_list1(ws(char(',')), parse_word),
    ))(input)?;

    let (input, _) = ws(tag_ci("DUE"))(input)?;
    let (input, due) = parse_timestamp(input)?;
    Ok((input, Command::Create { text, tags: tags.unwrap_or_default(), due }))
}

fn parse_get(input: &str) -> IResult<&str, Command> {
    let (input, _) = tag_ci("GET")(input)?;
    let (input, _) = multispace1(input)?;
    let (input, id) = parse_u64(input)?;
    Ok((input, Command::Get { id }))
}

fn parse_delete(input: &str) -> IResult<&str, Command> {
    let (input, _) = tag_ci("DELETE")(input)?;
    let (input, _) = multispace1(input)?;
    alt((
        value(Command::DeleteAll, tag_ci("ALL")),
        map(parse_u64, |id| Command::Delete { id }),
    ))(input)
}

fn parse_list(input: &str) -> IResult<&str, Command> {
    let (input, _) = tag_ci("LIST")(input)?;
    Ok((input, Command::List))
}

fn parse_tag(input: &str) -> IResult<&str, Command> {
    let (input, _) = tag_ci("TAG")(input)?;
    let (input, _) = multispace1(input)?;
    let (input, tag) = parse_word(input)?;
    Ok((input, Command::Tag { tag }))
}

// DUE 2024-05-01
fn parse_due(input: &str) -> IResult<&str, Command> {
    let (input, _) = tag_ci("DUE")(input)?;
    let (input, _) = multispace1(input)?;
    let (input, year) = parse_i32(input)?;
    let (input, _) = char('-')(input)?;
    let (input, month) = verify(parse_u32, |m: &u32| (1..=12).contains(m))(input)?;
    let (input, _) = char('-')(input)?;
    let (input, day) = parse_u32(input)?;
    Ok((input, Command::Due { year, month, day }))
}

fn parse_help(input: &str) -> IResult<&str, Command> {
    let (input, _) = tag_ci("HELP")(input)?;
    Ok((input, Command::Help))
}

fn parse_exit(input: &str) -> IResult<&str, Command> {
    let (input, _) = alt((tag_ci("EXIT"), tag_ci("QUIT")))(input)?;
    Ok((input, Command::Exit))
}

pub fn parse_command(input: &str) -> Result<Command, String> {
    let input = input.trim();
    let result = alt((
        parse_create,
        parse_get,
        parse_delete,
        parse_list,
        parse_tag,
        parse_due,
        parse_help,
        parse_exit,
    ))(input);

    match result {
        Ok((remainder, cmd)) => {
            if !remainder.trim().is_empty() {
                return Err(format!("Unexpected tokens at end: '{}'", remainder));
            }
            Ok(cmd)
        },
        Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => {
            let context: String = e.input.chars().take(20).collect();
            if context.len() < e.input.len() {
                Err(format!("Invalid syntax near: '{}...'", context))
            } else {
                Err(format!("Invalid syntax near: '{}'", context))
            }
        },
        Err(nom::Err::Incomplete(_)) => Err("Incomplete command.".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_with_tags() {
        let cmd = parse_command(r#"create "buy milk" TAGS errand, "at home" DUE 2024-05-01T00:00:00Z"#).unwrap();
        assert_eq!(
            cmd,
            Command::Create {
                text: "buy milk".into(),
                tags: vec!["errand".into(), "at home".into()],
                due: DateTime::parse_from_rfc3339("2024-05-01T00:00:00Z").unwrap(),
            }
        );
    }

    #[test]
    fn create_without_tags() {
        match parse_command(r#"CREATE "x" DUE 2024-05-01T09:00:00+02:00"#).unwrap() {
            Command::Create { tags, due, .. } => {
                assert!(tags.is_empty());
                assert_eq!(due.offset().local_minus_utc(), 7200);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn create_rejects_bad_timestamp() {
        assert!(parse_command(r#"CREATE "x" DUE tomorrow"#).is_err());
    }

    #[test]
    fn simple_commands() {
        assert_eq!(parse_command("GET 3"), Ok(Command::Get { id: 3 }));
        assert_eq!(parse_command("delete 3"), Ok(Command::Delete { id: 3 }));
        assert_eq!(parse_command("DELETE ALL"), Ok(Command::DeleteAll));
        assert_eq!(parse_command("  list  "), Ok(Command::List));
        assert_eq!(parse_command("TAG work"), Ok(Command::Tag { tag: "work".into() }));
        assert_eq!(parse_command("HELP"), Ok(Command::Help));
        assert_eq!(parse_command("quit"), Ok(Command::Exit));
    }

    #[test]
    fn due_date() {
        assert_eq!(parse_command("DUE 2024-5-01"), Ok(Command::Due { year: 2024, month: 5, day: 1 }));
        assert!(parse_command("DUE 2024-13-01").is_err());
        assert!(parse_command("DUE 2024/05/01").is_err());
    }

    #[test]
    fn trailing_garbage_is_rejected() {
        let err = parse_command("GET 3 4").unwrap_err();
        assert!(err.contains("Unexpected tokens"));
        assert!(parse_command("GET abc").is_err());
        assert!(parse_command("FROB").is_err());
    }
}
