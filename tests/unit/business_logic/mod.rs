mod filing_loader;
