use llm_fanout::error::AppResult;

fn main() -> AppResult<()> {
    llm_fanout::entry::run()
}
