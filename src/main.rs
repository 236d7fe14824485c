use runboard::entry;
use runboard::error::AppResult;

fn main() -> AppResult<()> {
    entry::run()
}
