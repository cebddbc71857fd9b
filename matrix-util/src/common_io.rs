use flate2::read::GzDecoder;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Lines split into tokens, with an optional header line
pub struct ReadLinesOut<T> {
    pub lines: Vec<Vec<T>>,
    pub header: Vec<Box<str>>,
}

fn is_comment_line(line: &str) -> bool {
    line.starts_with('#') || line.starts_with('%')
}

///
/// Read whitespace-separated words of every non-comment, non-empty
/// line into memory
///
/// * `input_file` - file name--either gzipped or not
/// * `hdr_line` - location of a header line (-1 = no header line)
///
pub fn read_lines_of_words(input_file: &str, hdr_line: i64) -> anyhow::Result<ReadLinesOut<Box<str>>> {
    let ReadLinesOut { lines, header } = read_lines_of_types::<String>(input_file, hdr_line)?;
    let lines = lines
        .into_iter()
        .map(|words| words.into_iter().map(String::into_boxed_str).collect())
        .collect();
    Ok(ReadLinesOut { lines, header })
}

///
/// Read every line and parse each whitespace-separated token as `T`
///
/// * `input_file` - file name--either gzipped or not
/// * `hdr_line` - location of a header line (-1 = no header line)
///
pub fn read_lines_of_types<T>(input_file: &str, hdr_line: i64) -> anyhow::Result<ReadLinesOut<T>>
where
    T: std::str::FromStr,
    <T as std::str::FromStr>::Err: std::fmt::Display,
{
    let buf = open_buf_reader(input_file)?;

    let mut lines = vec![];
    let mut header = vec![];

    for (i, line) in buf.lines().enumerate() {
        let line = line?;
        if hdr_line >= 0 && i as i64 == hdr_line {
            header.extend(line.split_whitespace().map(|x| x.to_owned().into_boxed_str()));
            continue;
        }
        if line.trim().is_empty() || is_comment_line(&line) {
            continue;
        }

        let words = line
            .split_whitespace()
            .map(|w| {
                w.parse::<T>().map_err(|e| {
                    anyhow::anyhow!("{}:{}: failed to parse `{}`: {}", input_file, i + 1, w, e)
                })
            })
            .collect::<anyhow::Result<Vec<T>>>()?;

        lines.push(words);
    }

    Ok(ReadLinesOut { lines, header })
}

///
/// Write every line into the output_file
///
/// * `lines` - vector of lines
/// * `output_file` - file name--either gzipped or not
///
pub fn write_lines<T>(lines: &[T], output_file_path: &str) -> anyhow::Result<()>
where
    T: std::fmt::Display,
{
    let mut buf = open_buf_writer(output_file_path)?;
    for line in lines {
        if let Err(e) = writeln!(buf, "{}", line) {
            if e.kind() == std::io::ErrorKind::BrokenPipe {
                return Ok(());
            } else {
                return Err(anyhow::anyhow!("unexpected error: {}", e));
            }
        }
    }
    buf.flush()?;
    Ok(())
}

///
/// Append one line to a plain-text log file, creating it if needed
///
/// * `line` - line to append (without a newline)
/// * `output_file` - file name
///
pub fn append_line(line: &str, output_file_path: &str) -> anyhow::Result<()> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(output_file_path)
        .map_err(|e| anyhow::anyhow!("cannot open {} for appending: {}", output_file_path, e))?;
    let mut buf = BufWriter::new(file);
    writeln!(buf, "{}", line)?;
    buf.flush()?;
    Ok(())
}

///
/// Open a file for reading, and return a buffered reader
/// * `input_file` - file name--either gzipped or not
pub fn open_buf_reader(input_file: &str) -> anyhow::Result<Box<dyn BufRead>> {
    let ext = Path::new(input_file).extension().and_then(|x| x.to_str());
    let file = File::open(input_file)
        .map_err(|e| anyhow::anyhow!("cannot open {}: {}", input_file, e))?;
    match ext {
        Some("gz") => Ok(Box::new(BufReader::new(GzDecoder::new(file)))),
        _ => Ok(Box::new(BufReader::new(file))),
    }
}

///
/// Open a file for writing, and return a buffered writer
/// * `output_file` - file name--either gzipped or not
pub fn open_buf_writer(output_file: &str) -> anyhow::Result<Box<dyn Write>> {
    if output_file.eq_ignore_ascii_case("stdout") {
        return Ok(Box::new(BufWriter::new(std::io::stdout())));
    }

    let ext = Path::new(output_file).extension().and_then(|x| x.to_str());
    let file = File::create(output_file)
        .map_err(|e| anyhow::anyhow!("cannot create {}: {}", output_file, e))?;
    match ext {
        Some("gz") => {
            let encoder = flate2::write::GzEncoder::new(file, flate2::Compression::default());
            Ok(Box::new(BufWriter::new(encoder)))
        }
        _ => Ok(Box::new(BufWriter::new(file))),
    }
}

///
/// Return the first existing file among `{dir}/{base}` and
/// `{dir}/{base}.gz`
///
pub fn find_plain_or_gz(dir: &str, base: &str) -> Option<Box<str>> {
    let plain = Path::new(dir).join(base);
    if plain.is_file() {
        return plain.to_str().map(|x| x.into());
    }
    let gz = Path::new(dir).join(format!("{}.gz", base));
    if gz.is_file() {
        return gz.to_str().map(|x| x.into());
    }
    None
}

///
/// Create a directory and all of its parents if needed
/// * `dir` - directory name
///
pub fn mkdir_all(dir: &str) -> anyhow::Result<()> {
    std::fs::create_dir_all(dir)
        .map_err(|e| anyhow::anyhow!("cannot create directory {}: {}", dir, e))?;
    Ok(())
}

///
/// Create a fresh temporary directory that is kept on disk
///
pub fn create_temp_dir() -> anyhow::Result<PathBuf> {
    let dir = tempfile::tempdir()?.keep();
    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}
